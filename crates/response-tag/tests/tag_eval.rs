//! End-to-end tests for the response-eval tag: in-memory stores, a
//! recording mock sender, and the full run pipeline.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use chrono::{Duration, Utc};
use response_tag::{
    Header, HostCapabilities, InMemoryStore, NetworkSender, RenderContext, RenderPurpose, Request,
    RequestChain, Response, ResponseTag, Result, TagError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock sender: returns a preconfigured response, counts sends, and records
/// the chain it was handed.
#[derive(Default)]
struct RecordingSender {
    next: parking_lot::Mutex<Option<Response>>,
    sends: AtomicUsize,
    last_chain: parking_lot::Mutex<Option<Vec<String>>>,
}

impl RecordingSender {
    fn set_next(&self, response: Response) {
        *self.next.lock() = Some(response);
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn last_chain(&self) -> Option<Vec<String>> {
        self.last_chain.lock().clone()
    }
}

#[async_trait]
impl NetworkSender for RecordingSender {
    async fn send(&self, request: &Request, chain: &RequestChain) -> Result<Response> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        *self.last_chain.lock() = Some(chain.ids().to_vec());
        self.next
            .lock()
            .clone()
            .ok_or_else(|| TagError::SendFailed(format!("no route to host for {}", request.name)))
    }
}

fn setup() -> (ResponseTag, Arc<InMemoryStore>, Arc<RecordingSender>) {
    let store = Arc::new(InMemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    store.insert_request(Request {
        id: "req_1".to_string(),
        name: "Get Token".to_string(),
    });

    let tag = ResponseTag::new(HostCapabilities {
        requests: store.clone(),
        responses: store.clone(),
        network: sender.clone(),
    });
    (tag, store, sender)
}

fn json_response(request_id: &str, body: &str) -> Response {
    Response {
        request_id: request_id.to_string(),
        status_code: 200,
        error: None,
        created: Utc::now(),
        content_type: Some("application/json; charset=utf-8".to_string()),
        headers: vec![
            Header {
                name: "Content-Type".to_string(),
                value: "application/json".to_string(),
            },
            Header {
                name: "Content-Length".to_string(),
                value: body.len().to_string(),
            },
        ],
        body: Some(Bytes::copy_from_slice(body.as_bytes())),
    }
}

fn encode(expression: &str) -> String {
    general_purpose::STANDARD.encode(expression)
}

fn send_ctx() -> RenderContext {
    RenderContext::new(RenderPurpose::Send)
}

#[tokio::test]
async fn raw_body_passes_through_without_expression() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "{\"foo\": \"bar\"}"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap();
    assert_eq!(result, "{\"foo\": \"bar\"}");
}

#[tokio::test]
async fn expression_transforms_the_body() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "{\"foo\": \"bar\"}"));

    let result = tag
        .run(
            &send_ctx(),
            "raw",
            "req_1",
            "",
            "never",
            None,
            &encode("parse_json(output).foo"),
        )
        .await
        .unwrap();
    assert_eq!(result, "bar");
}

#[tokio::test]
async fn expression_failures_are_wrapped() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "not json"));

    let err = tag
        .run(
            &send_ctx(),
            "raw",
            "req_1",
            "",
            "never",
            None,
            &encode("parse_json(output).foo"),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Cannot eval: "));
}

#[tokio::test]
async fn header_lookup_matrix() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "{}"));

    for filter in ["content-type", "Content-Type", "CONTENT-type", "CONTENT-type   "] {
        let result = tag
            .run(&send_ctx(), "header", "req_1", filter, "never", None, "")
            .await
            .unwrap();
        assert_eq!(result, "application/json", "filter {filter:?}");
    }
}

#[tokio::test]
async fn missing_header_enumerates_choices_in_order() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "{}"));

    let err = tag
        .run(&send_ctx(), "header", "req_1", "missing", "never", None, "")
        .await
        .unwrap_err();
    let message = err.to_string();
    let content_type = message.find("\"Content-Type\"").expect("Content-Type listed");
    let content_length = message
        .find("\"Content-Length\"")
        .expect("Content-Length listed");
    assert!(content_type < content_length);
}

#[tokio::test]
async fn empty_header_filter_is_rejected() {
    let (tag, store, _) = setup();
    store.record_response(None, json_response("req_1", "{}"));

    let err = tag
        .run(&send_ctx(), "header", "req_1", "   ", "never", None, "")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No header filter specified");
}

#[tokio::test]
async fn unknown_request_id() {
    let (tag, _, _) = setup();
    let err = tag
        .run(&send_ctx(), "raw", "req_missing", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Could not find request req_missing"));
}

#[tokio::test]
async fn empty_request_id() {
    let (tag, _, _) = setup();
    let err = tag
        .run(&send_ctx(), "raw", "", "", "never", None, "")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No request specified");
}

#[tokio::test]
async fn invalid_field_selector() {
    let (tag, _, _) = setup();
    let err = tag
        .run(&send_ctx(), "cookie", "req_1", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid response field cookie"));
}

#[tokio::test]
async fn no_responses_for_request() {
    let (tag, _, _) = setup();
    let err = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No responses for request"));
}

#[tokio::test]
async fn statusless_response_is_rejected() {
    let (tag, store, _) = setup();
    let mut response = json_response("req_1", "{}");
    response.status_code = 0;
    store.record_response(None, response);

    let err = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No successful responses for request"));
}

#[tokio::test]
async fn errored_response_surfaces_the_error() {
    let (tag, store, _) = setup();
    let mut response = json_response("req_1", "{}");
    response.error = Some("ECONNREFUSED".to_string());
    store.record_response(None, response);

    let err = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ECONNREFUSED"));
}

#[tokio::test]
async fn absent_body_buffer_decodes_to_empty() {
    let (tag, store, _) = setup();
    let mut response = json_response("req_1", "{}");
    response.body = None;
    store.record_response(None, response);

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap();
    assert_eq!(result, "");
}

#[tokio::test]
async fn always_resends_on_send_renders() {
    let (tag, store, sender) = setup();
    store.record_response(None, json_response("req_1", "stale"));
    sender.set_next(json_response("req_1", "fresh"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "ALWAYS", None, "")
        .await
        .unwrap();
    assert_eq!(result, "fresh");
    assert_eq!(sender.sends(), 1);
}

#[tokio::test]
async fn preview_renders_never_touch_the_network() {
    let (tag, store, sender) = setup();
    store.record_response(None, json_response("req_1", "stale"));
    sender.set_next(json_response("req_1", "fresh"));

    let ctx = RenderContext::new(RenderPurpose::Preview);
    let result = tag
        .run(&ctx, "raw", "req_1", "", "always", None, "")
        .await
        .unwrap();
    assert_eq!(result, "stale");
    assert_eq!(sender.sends(), 0);
}

#[tokio::test]
async fn no_history_skips_resend_when_a_response_exists() {
    let (tag, store, sender) = setup();
    store.record_response(None, json_response("req_1", "existing"));
    sender.set_next(json_response("req_1", "fresh"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "no-history", None, "")
        .await
        .unwrap();
    assert_eq!(result, "existing");
    assert_eq!(sender.sends(), 0);
}

#[tokio::test]
async fn no_history_resends_without_a_response() {
    let (tag, _, sender) = setup();
    sender.set_next(json_response("req_1", "fresh"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "no-history", None, "")
        .await
        .unwrap();
    assert_eq!(result, "fresh");
    assert_eq!(sender.sends(), 1);
}

#[tokio::test]
async fn when_expired_resends_only_stale_responses() {
    let (tag, store, sender) = setup();
    let mut stale = json_response("req_1", "stale");
    stale.created = Utc::now() - Duration::seconds(120);
    store.record_response(None, stale);
    sender.set_next(json_response("req_1", "fresh"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "when-expired", Some(60), "")
        .await
        .unwrap();
    assert_eq!(result, "fresh");
    assert_eq!(sender.sends(), 1);

    // The fresh response just recorded by the host would now be within the
    // max age; simulate that and verify no further send happens.
    store.clear_responses();
    store.record_response(None, json_response("req_1", "recent"));
    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "when-expired", Some(60), "")
        .await
        .unwrap();
    assert_eq!(result, "recent");
    assert_eq!(sender.sends(), 1);
}

#[tokio::test]
async fn chain_membership_suppresses_resend() {
    let (tag, store, sender) = setup();
    store.record_response(None, json_response("req_1", "existing"));
    sender.set_next(json_response("req_1", "fresh"));

    let ctx = send_ctx().with_chain(["req_1"].into_iter().collect());
    let result = tag
        .run(&ctx, "raw", "req_1", "", "always", None, "")
        .await
        .unwrap();
    assert_eq!(result, "existing");
    assert_eq!(sender.sends(), 0);
}

#[tokio::test]
async fn resend_extends_the_chain_for_nested_renders() {
    let (tag, _, sender) = setup();
    sender.set_next(json_response("req_1", "fresh"));

    let ctx = send_ctx().with_chain(["req_0"].into_iter().collect());
    tag.run(&ctx, "raw", "req_1", "", "always", None, "")
        .await
        .unwrap();

    assert_eq!(
        sender.last_chain().unwrap(),
        vec!["req_0".to_string(), "req_1".to_string()]
    );
    // The caller's chain is untouched (copy-on-extend)
    assert_eq!(ctx.chain.ids(), ["req_0".to_string()]);
}

#[tokio::test]
async fn failed_resend_is_terminal() {
    let (tag, _, sender) = setup();
    // No next response configured: the sender fails

    let err = tag
        .run(&send_ctx(), "raw", "req_1", "", "always", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to send dependent request"));
    assert_eq!(sender.sends(), 1);
}

#[tokio::test]
async fn unknown_policy_spelling_defaults_to_never() {
    let (tag, store, sender) = setup();
    store.record_response(None, json_response("req_1", "existing"));
    sender.set_next(json_response("req_1", "fresh"));

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "sometimes", None, "")
        .await
        .unwrap();
    assert_eq!(result, "existing");
    assert_eq!(sender.sends(), 0);
}

#[tokio::test]
async fn environment_scopes_the_latest_response() {
    let (tag, store, _) = setup();
    store.record_response(Some("env_prod"), json_response("req_1", "prod body"));

    let ctx = send_ctx().with_environment("env_prod");
    let result = tag
        .run(&ctx, "raw", "req_1", "", "never", None, "")
        .await
        .unwrap();
    assert_eq!(result, "prod body");

    let other = send_ctx().with_environment("env_dev");
    let err = tag
        .run(&other, "raw", "req_1", "", "never", None, "")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No responses for request"));
}

#[tokio::test]
async fn charset_aware_body_decoding() {
    let (tag, store, _) = setup();
    let mut response = json_response("req_1", "");
    response.content_type = Some("text/plain; charset=ISO-8859-1".to_string());
    response.body = Some(Bytes::from_static(&[0x63, 0x61, 0x66, 0xE9]));
    store.record_response(None, response);

    let result = tag
        .run(&send_ctx(), "raw", "req_1", "", "never", None, "")
        .await
        .unwrap();
    assert_eq!(result, "café");
}
