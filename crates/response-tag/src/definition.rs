//! Declarative argument schema for the host's tag-editor UI.
//!
//! Core logic never reads these types; the host serializes the definition to
//! drive its form rendering. Field names follow the host's camelCase wire
//! format.

use crate::resend::DEFAULT_MAX_AGE_SECONDS;
use serde::Serialize;
use serde_json::{json, Value};

/// A template tag as presented to the host
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub args: Vec<TagArg>,
}

/// One argument in the tag-editor form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagArg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<ArgOption>,
    /// Model name for `model`-typed args (e.g. "Request")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Storage encoding for string args ("base64")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Hide this arg unless another arg holds a given value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_unless: Option<HideUnless>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Enum,
    Model,
    String,
    Number,
}

/// One choice of an enum-typed arg
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgOption {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
}

/// Declarative visibility rule: show only when `arg` equals `equals`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HideUnless {
    pub arg: usize,
    pub equals: String,
}

impl TagArg {
    fn new(arg_type: ArgType) -> Self {
        Self {
            display_name: None,
            arg_type,
            description: None,
            help: None,
            default_value: None,
            options: Vec::new(),
            model: None,
            encoding: None,
            placeholder: None,
            hide_unless: None,
        }
    }
}

impl TagDefinition {
    /// The response-eval tag schema: attribute selector, request reference,
    /// trigger behavior, max age, conditional header name, and the
    /// base64-encoded expression.
    pub fn response_eval() -> Self {
        let attribute = TagArg {
            display_name: Some("Attribute".to_string()),
            options: vec![
                ArgOption {
                    display_name: "Raw Body".to_string(),
                    description: Some("entire response body".to_string()),
                    value: "raw".to_string(),
                },
                ArgOption {
                    display_name: "Header".to_string(),
                    description: Some("value of response header".to_string()),
                    value: "header".to_string(),
                },
            ],
            ..TagArg::new(ArgType::Enum)
        };

        let request = TagArg {
            display_name: Some("Request".to_string()),
            model: Some("Request".to_string()),
            ..TagArg::new(ArgType::Model)
        };

        let trigger = TagArg {
            display_name: Some("Trigger Behavior".to_string()),
            help: Some("Configure when to resend the dependent request".to_string()),
            default_value: Some(json!("never")),
            options: vec![
                ArgOption {
                    display_name: "Never".to_string(),
                    description: Some("never resend request".to_string()),
                    value: "never".to_string(),
                },
                ArgOption {
                    display_name: "No History".to_string(),
                    description: Some("resend when no responses present".to_string()),
                    value: "no-history".to_string(),
                },
                ArgOption {
                    display_name: "When Expired".to_string(),
                    description: Some("resend when existing response has expired".to_string()),
                    value: "when-expired".to_string(),
                },
                ArgOption {
                    display_name: "Always".to_string(),
                    description: Some("resend request when needed".to_string()),
                    value: "always".to_string(),
                },
            ],
            ..TagArg::new(ArgType::Enum)
        };

        let max_age = TagArg {
            display_name: Some("Max Age (seconds)".to_string()),
            help: Some("Only applies to 'When Expired'".to_string()),
            default_value: Some(json!(DEFAULT_MAX_AGE_SECONDS)),
            ..TagArg::new(ArgType::Number)
        };

        let header_name = TagArg {
            display_name: Some("Header Name".to_string()),
            hide_unless: Some(HideUnless {
                arg: 0,
                equals: "header".to_string(),
            }),
            ..TagArg::new(ArgType::String)
        };

        let expression = TagArg {
            display_name: Some("Expression".to_string()),
            description: Some(
                "The variable named `output` contains the extracted response value.".to_string(),
            ),
            encoding: Some("base64".to_string()),
            placeholder: Some("output".to_string()),
            ..TagArg::new(ArgType::String)
        };

        Self {
            name: "responseEval".to_string(),
            display_name: "Response Eval".to_string(),
            description:
                "reference values from other request's responses and post-process the output"
                    .to_string(),
            args: vec![attribute, request, trigger, max_age, header_name, expression],
        }
    }
}
