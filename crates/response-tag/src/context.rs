//! Host capability seams and per-render context.
//!
//! The tag never talks to the host's database or network stack directly.
//! Everything it needs is narrowed to three traits: request lookup, latest
//! response lookup (plus the body-buffer accessor, since hosts may spool
//! bodies to disk), and the network sender used for a conditional resend.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A previously-defined request, looked up by id. Opaque to the tag; only
/// the identifier participates in any decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// A single response header. Order and casing are preserved as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// The latest recorded response for a request within one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub status_code: u16,
    /// Transport-level failure recorded by the host instead of a status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Inline body, if the host keeps it in memory. Read through
    /// [`ResponseStore::get_body_buffer`], never directly.
    #[serde(skip)]
    pub body: Option<Bytes>,
}

/// Recursion guard: the request ids already resent within one render pass.
///
/// Copy-on-extend by construction. Each dependency edge gets its own extended
/// copy, so a chain can never leak mutations across sibling evaluations or
/// across unrelated renders.
#[derive(Debug, Clone, Default)]
pub struct RequestChain(Vec<String>);

impl RequestChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.0.iter().any(|id| id == request_id)
    }

    /// A new chain with `request_id` appended; `self` is untouched.
    pub fn extended(&self, request_id: &str) -> Self {
        let mut ids = self.0.clone();
        ids.push(request_id.to_string());
        Self(ids)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for RequestChain {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Why the host is rendering: a real send, or a dry preview/inspection pass.
/// Only a real send may trigger network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPurpose {
    Send,
    Preview,
}

impl RenderPurpose {
    pub fn is_send(self) -> bool {
        self == RenderPurpose::Send
    }
}

/// Per-render context handed down by the host's template pipeline.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Active environment, scoping the latest-response lookup
    pub environment_id: Option<String>,
    pub purpose: RenderPurpose,
    /// Recursion guard for this render; empty at the top level
    pub chain: RequestChain,
}

impl RenderContext {
    pub fn new(purpose: RenderPurpose) -> Self {
        Self {
            environment_id: None,
            purpose,
            chain: RequestChain::new(),
        }
    }

    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    pub fn with_chain(mut self, chain: RequestChain) -> Self {
        self.chain = chain;
        self
    }
}

/// Request lookup by identifier.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_by_id(&self, request_id: &str) -> Option<Request>;
}

/// Latest-response lookup and body access.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// The most recent response for a request, scoped to an environment
    /// when one is active.
    async fn get_latest_for_request(
        &self,
        request_id: &str,
        environment_id: Option<&str>,
    ) -> Option<Response>;

    /// Raw body bytes for a response, or `None` when no body was recorded.
    async fn get_body_buffer(&self, response: &Response) -> Option<Bytes>;
}

/// Network send capability for resending a dependent request.
#[async_trait]
pub trait NetworkSender: Send + Sync {
    /// Send `request` and return its new response. The chain carries the
    /// recursion guard into any nested renders the send performs.
    async fn send(&self, request: &Request, chain: &RequestChain) -> Result<Response>;
}

/// The three host capabilities bundled for the tag.
#[derive(Clone)]
pub struct HostCapabilities {
    pub requests: Arc<dyn RequestStore>,
    pub responses: Arc<dyn ResponseStore>,
    pub network: Arc<dyn NetworkSender>,
}
