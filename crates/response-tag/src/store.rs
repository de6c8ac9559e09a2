//! In-memory request/response store.
//!
//! Backs the integration tests and embedders that have no persistence layer
//! of their own. Responses are kept newest-last per request; an optional
//! environment id scopes lookups the way the host's database does.

use crate::context::{Request, RequestStore, Response, ResponseStore};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

struct StoredResponse {
    environment_id: Option<String>,
    response: Response,
}

/// Thread-safe in-memory store implementing both lookup capabilities
#[derive(Default)]
pub struct InMemoryStore {
    requests: RwLock<HashMap<String, Request>>,
    responses: RwLock<HashMap<String, Vec<StoredResponse>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_request(&self, request: Request) {
        self.requests.write().insert(request.id.clone(), request);
    }

    /// Record a response for a request, optionally scoped to an environment.
    /// Later records shadow earlier ones in latest-response lookups.
    pub fn record_response(&self, environment_id: Option<&str>, response: Response) {
        let mut responses = self.responses.write();
        responses
            .entry(response.request_id.clone())
            .or_default()
            .push(StoredResponse {
                environment_id: environment_id.map(str::to_string),
                response,
            });
    }

    pub fn clear_responses(&self) {
        self.responses.write().clear();
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn get_by_id(&self, request_id: &str) -> Option<Request> {
        self.requests.read().get(request_id).cloned()
    }
}

#[async_trait]
impl ResponseStore for InMemoryStore {
    async fn get_latest_for_request(
        &self,
        request_id: &str,
        environment_id: Option<&str>,
    ) -> Option<Response> {
        let responses = self.responses.read();
        responses.get(request_id).and_then(|stored| {
            stored
                .iter()
                .rev()
                .find(|s| {
                    s.environment_id.is_none() || s.environment_id.as_deref() == environment_id
                })
                .map(|s| s.response.clone())
        })
    }

    async fn get_body_buffer(&self, response: &Response) -> Option<Bytes> {
        response.body.clone()
    }
}
