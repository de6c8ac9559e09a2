//! Response-eval template tag.
//!
//! Reference another request's latest response from inside a template:
//! conditionally resend the dependent request, extract its raw body or a
//! header value, and optionally post-process the value with a Rhai
//! expression bound to `output`.
//!
//! The host supplies persistence and networking through the traits in
//! [`context`]; the tag itself is [`tag::ResponseTag::run`].

pub mod context;
pub mod definition;
pub mod error;
pub mod extract;
pub mod resend;
pub mod script;
pub mod store;
pub mod tag;

pub use context::{
    Header, HostCapabilities, NetworkSender, RenderContext, RenderPurpose, Request, RequestChain,
    RequestStore, Response, ResponseStore,
};
pub use definition::TagDefinition;
pub use error::{Result, TagError};
pub use extract::ResponseField;
pub use resend::{ResendPolicy, DEFAULT_MAX_AGE_SECONDS};
pub use store::InMemoryStore;
pub use tag::ResponseTag;
