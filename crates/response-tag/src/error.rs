//! Error taxonomy for tag evaluation.
//!
//! Every failure is terminal for the invocation that raised it; nothing is
//! retried internally. Messages are user-visible and mirror what the host
//! renders inline in the template editor.

/// Errors raised while evaluating a response tag
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("Invalid response field {0}")]
    InvalidField(String),
    #[error("No request specified")]
    NoRequestSpecified,
    #[error("Could not find request {0}")]
    RequestNotFound(String),
    #[error("No responses for request")]
    NoResponses,
    #[error("Response failed: {0}")]
    ResponseFailed(String),
    #[error("No successful responses for request")]
    NoSuccessfulResponse,
    #[error("Failed to send dependent request: {0}")]
    SendFailed(String),
    #[error("No {0} filter specified")]
    NoFilterSpecified(String),
    #[error("No headers available")]
    NoHeaders,
    #[error("No header with name \"{name}\".\nChoices are [\n\t{choices}\n]")]
    HeaderNotFound { name: String, choices: String },
    #[error("Invalid expression encoding: {0}")]
    InvalidExpressionEncoding(String),
    #[error("Cannot eval: {0}")]
    Eval(String),
}

impl TagError {
    /// Build a header-not-found error enumerating the valid choices in
    /// their stored order and casing.
    pub fn header_not_found<'a>(name: &str, available: impl Iterator<Item = &'a str>) -> Self {
        let choices = available
            .map(|n| format!("\"{n}\""))
            .collect::<Vec<_>>()
            .join(",\n\t");
        TagError::HeaderNotFound {
            name: name.to_string(),
            choices,
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
