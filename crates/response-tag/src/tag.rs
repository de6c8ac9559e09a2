//! The response-eval tag: the single operation the template pipeline calls.

use crate::context::{HostCapabilities, RenderContext, Response};
use crate::definition::TagDefinition;
use crate::error::{Result, TagError};
use crate::extract::{decode_body, match_header, validate_response, ResponseField};
use crate::resend::{should_resend, ResendPolicy, DEFAULT_MAX_AGE_SECONDS};
use crate::script::evaluate_expression;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use tracing::debug;

/// Reads (and conditionally re-triggers) another request's latest response.
///
/// One instance serves any number of concurrent renders; all state lives in
/// the per-render [`RenderContext`] and the host stores.
#[derive(Clone)]
pub struct ResponseTag {
    host: HostCapabilities,
}

impl ResponseTag {
    pub fn new(host: HostCapabilities) -> Self {
        Self { host }
    }

    /// Argument schema for the host's tag-editor UI.
    pub fn definition() -> TagDefinition {
        TagDefinition::response_eval()
    }

    /// Evaluate the tag. Steps run strictly in sequence: resolve the
    /// request, resolve its latest response, decide on a resend, validate,
    /// extract the selected field, then run the optional expression.
    ///
    /// `resend_behavior` accepts any casing of the policy names and falls
    /// back to `never`. `encoded_expression` is base64; empty means no
    /// post-processing.
    pub async fn run(
        &self,
        ctx: &RenderContext,
        field: &str,
        request_id: &str,
        filter: &str,
        resend_behavior: &str,
        max_age_seconds: Option<i64>,
        encoded_expression: &str,
    ) -> Result<String> {
        let field = ResponseField::parse(field)?;

        if request_id.is_empty() {
            return Err(TagError::NoRequestSpecified);
        }

        let request = self
            .host
            .requests
            .get_by_id(request_id)
            .await
            .ok_or_else(|| TagError::RequestNotFound(request_id.to_string()))?;

        let expression = decode_expression(encoded_expression)?;
        let policy = ResendPolicy::parse(resend_behavior);
        let max_age = max_age_seconds.unwrap_or(DEFAULT_MAX_AGE_SECONDS);

        let latest = self
            .host
            .responses
            .get_latest_for_request(request_id, ctx.environment_id.as_deref())
            .await;

        let resend = should_resend(
            policy,
            latest.as_ref(),
            max_age,
            &ctx.chain,
            request_id,
            ctx.purpose,
            Utc::now(),
        );

        let response = if resend {
            debug!(request_id, policy = policy.as_str(), "resending dependent request");
            // Guard the nested send against recursing back into this request
            let chain = ctx.chain.extended(request_id);
            Some(self.host.network.send(&request, &chain).await?)
        } else {
            latest
        };

        let response = response.ok_or(TagError::NoResponses)?;
        validate_response(&response)?;

        let output = self.extract_field(&response, field, filter).await?;
        evaluate_expression(&expression, &output)
    }

    async fn extract_field(
        &self,
        response: &Response,
        field: ResponseField,
        filter: &str,
    ) -> Result<String> {
        match field {
            ResponseField::Header => {
                let filter = filter.trim();
                if filter.is_empty() {
                    return Err(TagError::NoFilterSpecified(field.as_str().to_string()));
                }
                match_header(&response.headers, filter)
            }
            ResponseField::Raw => {
                let buffer = self.host.responses.get_body_buffer(response).await;
                Ok(decode_body(buffer.as_ref(), response.content_type.as_deref()))
            }
        }
    }
}

fn decode_expression(encoded: &str) -> Result<String> {
    if encoded.is_empty() {
        return Ok(String::new());
    }
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| TagError::InvalidExpressionEncoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| TagError::InvalidExpressionEncoding(e.to_string()))
}
