//! Body and header extraction from a resolved response.

use crate::context::{Header, Response};
use crate::error::{Result, TagError};
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

/// Regex for the charset parameter in a content type, e.g.
/// `application/json; charset=ISO-8859-1`
static CHARSET_REGEX: OnceLock<Regex> = OnceLock::new();

fn charset_regex() -> &'static Regex {
    CHARSET_REGEX.get_or_init(|| Regex::new(r"(?i)charset=([a-zA-Z0-9-]+)").unwrap())
}

/// Which part of the response the tag reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseField {
    /// Entire decoded response body
    Raw,
    /// Value of a single response header
    Header,
}

impl ResponseField {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "raw" => Ok(ResponseField::Raw),
            "header" => Ok(ResponseField::Header),
            other => Err(TagError::InvalidField(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseField::Raw => "raw",
            ResponseField::Header => "header",
        }
    }
}

/// Reject responses the tag cannot read: a recorded transport failure, or a
/// missing status code (the host stores 0 when the send never completed).
pub fn validate_response(response: &Response) -> Result<()> {
    if let Some(error) = &response.error {
        return Err(TagError::ResponseFailed(error.clone()));
    }
    if response.status_code == 0 {
        return Err(TagError::NoSuccessfulResponse);
    }
    Ok(())
}

/// Look up a header by name, case-insensitively. The stored value is
/// returned as-is. A miss enumerates every available header name in its
/// recorded order and casing.
pub fn match_header(headers: &[Header], name: &str) -> Result<String> {
    if headers.is_empty() {
        return Err(TagError::NoHeaders);
    }

    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .ok_or_else(|| TagError::header_not_found(name, headers.iter().map(|h| h.name.as_str())))
}

/// Decode body bytes using the charset declared in the content type,
/// defaulting to UTF-8. Decoding never fails: an unknown charset label or
/// malformed input degrades to a lossy interpretation of the raw bytes.
pub fn decode_body(buffer: Option<&Bytes>, content_type: Option<&str>) -> String {
    let bytes = match buffer {
        Some(bytes) => bytes.as_ref(),
        None => return String::new(),
    };

    let label = content_type.and_then(|ct| {
        charset_regex()
            .captures(ct)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    });

    let encoding = match label {
        Some(label) => match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding,
            None => {
                warn!(charset = label, "unknown charset, falling back to utf-8");
                return String::from_utf8_lossy(bytes).into_owned();
            }
        },
        None => UTF_8,
    };

    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(charset = encoding.name(), "body decoded with replacements");
    }
    decoded.into_owned()
}
