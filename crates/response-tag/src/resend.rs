//! Resend decision engine.
//!
//! Decides whether the dependent request is re-issued before its response is
//! read. The policy itself is a pure function; the actual resend (and the
//! chain extension that guards it) happens in the tag orchestrator.

use crate::context::{RenderPurpose, RequestChain, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default staleness threshold for [`ResendPolicy::WhenExpired`]
pub const DEFAULT_MAX_AGE_SECONDS: i64 = 60;

/// When to resend the dependent request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResendPolicy {
    /// Never resend
    #[default]
    Never,
    /// Resend when no response exists yet
    NoHistory,
    /// Resend when the existing response is older than the max age
    WhenExpired,
    /// Always resend
    Always,
}

impl ResendPolicy {
    /// Parse a policy spelling, case-insensitively. Anything unrecognized
    /// (including empty) falls back to `Never`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "no-history" => ResendPolicy::NoHistory,
            "when-expired" => ResendPolicy::WhenExpired,
            "always" => ResendPolicy::Always,
            _ => ResendPolicy::Never,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResendPolicy::Never => "never",
            ResendPolicy::NoHistory => "no-history",
            ResendPolicy::WhenExpired => "when-expired",
            ResendPolicy::Always => "always",
        }
    }
}

/// Apply the resend policy to the currently resolved response.
///
/// Two overrides win over any policy: a request id already in the chain is
/// never resent again within the render, and nothing is resent unless the
/// render is an actual send.
pub fn should_resend(
    policy: ResendPolicy,
    response: Option<&Response>,
    max_age_seconds: i64,
    chain: &RequestChain,
    request_id: &str,
    purpose: RenderPurpose,
    now: DateTime<Utc>,
) -> bool {
    if chain.contains(request_id) || !purpose.is_send() {
        return false;
    }

    match policy {
        ResendPolicy::Never => false,
        ResendPolicy::NoHistory => response.is_none(),
        ResendPolicy::WhenExpired => match response {
            None => true,
            Some(response) => (now - response.created).num_seconds() > max_age_seconds,
        },
        ResendPolicy::Always => true,
    }
}
