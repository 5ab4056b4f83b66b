//! Maps whatever the upstream answered onto the normalized contract.

use crate::error::ProxyError;
use crate::link::{first_string, Container, UPSTREAM_LINK_FIELDS};
use crate::models::{DownloadResult, Metadata, ProxySuccess};
use crate::upstream::UpstreamReply;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

/// Upper bound, in bytes, of the body preview attached to failures.
pub const PREVIEW_LIMIT: usize = 2000;

static MARKUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype\s+html|<html[\s>]|<head[\s>]|<body[\s>]").unwrap());

/// A success flag and the container holding the result, both read from the
/// payload root.
#[derive(Debug, Clone, Copy)]
pub struct SuccessShape {
    pub flag: &'static str,
    pub container: Container,
}

/// Known upstream success shapes, tried in order.
pub const SUCCESS_SHAPES: &[SuccessShape] = &[
    SuccessShape { flag: "success", container: Container::Field("result") },
    SuccessShape { flag: "status", container: Container::Field("data") },
    SuccessShape { flag: "ok", container: Container::Root },
];

const TITLE_FIELDS: &[&str] = &["title", "name"];
const COVER_FIELDS: &[&str] = &["cover", "thumbnail", "image"];
const FORMAT_FIELDS: &[&str] = &["format", "type"];

/// Classifies one upstream reply. `default_format` fills `result.format` when
/// the upstream does not name one.
pub fn normalize(reply: &UpstreamReply, default_format: &str) -> Result<ProxySuccess, ProxyError> {
    let status = reply.status.as_u16();

    let text = match decode_text(reply) {
        Some(text) => text,
        None => {
            return Err(ProxyError::UpstreamBinary {
                status,
                content_type: reply.content_type.clone(),
                bytes: reply.body.len(),
            })
        }
    };
    let preview = truncate_utf8_prefix(text, PREVIEW_LIMIT);

    if reply.status.is_client_error() || reply.status.is_server_error() {
        return Err(ProxyError::UpstreamStatus { status, preview });
    }

    let shape_error = |reason: &'static str| ProxyError::UpstreamShape {
        reason,
        status,
        preview: preview.clone(),
    };

    let payload = match parse_payload(text) {
        Some(payload) => payload,
        None if looks_like_markup(text) => {
            return Err(shape_error("Upstream returned an HTML page instead of data"))
        }
        None => return Err(shape_error("Upstream returned a non-JSON body")),
    };

    let container = SUCCESS_SHAPES
        .iter()
        .filter(|shape| payload.get(shape.flag).is_some_and(is_truthy))
        .find_map(|shape| shape.container.resolve(&payload))
        .ok_or_else(|| shape_error("Upstream response has an unexpected shape"))?;

    let download_url = first_url(container, UPSTREAM_LINK_FIELDS)
        .ok_or_else(|| shape_error("Upstream signaled success but omitted a resource link"))?;

    let metadata = Metadata {
        title: lookup_string(container, &payload, TITLE_FIELDS),
        duration: ["duration", "lengthSeconds"]
            .iter()
            .find_map(|f| container.get(*f).filter(|v| !v.is_null()).cloned()),
        cover: lookup_string(container, &payload, COVER_FIELDS),
    };

    let result = DownloadResult {
        download_url,
        quality: container.get("quality").and_then(scalar_to_string),
        format: first_string(container, FORMAT_FIELDS, |_| true)
            .map(str::to_string)
            .or_else(|| Some(default_format.to_string()).filter(|f| !f.is_empty())),
    };

    Ok(ProxySuccess::new(metadata, result))
}

fn decode_text(reply: &UpstreamReply) -> Option<&str> {
    let declared_binary = reply.content_type.as_deref().is_some_and(|ct| {
        let ct = ct.trim().to_ascii_lowercase();
        ["audio/", "video/", "image/", "application/octet-stream"]
            .iter()
            .any(|prefix| ct.starts_with(prefix))
    });
    if declared_binary {
        return None;
    }
    std::str::from_utf8(&reply.body).ok()
}

/// Parses JSON, unwrapping one level of string-encoded JSON. Only objects
/// count as structured data.
fn parse_payload(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()).ok()? {
        Value::Object(map) => Some(Value::Object(map)),
        Value::String(inner) => match serde_json::from_str::<Value>(inner.trim()).ok()? {
            Value::Object(map) => Some(Value::Object(map)),
            _ => None,
        },
        _ => None,
    }
}

pub fn looks_like_markup(text: &str) -> bool {
    MARKUP_REGEX.is_match(text) || text.trim_start().starts_with('<')
}

/// JavaScript-style truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_http_url(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// First field holding an absolute http(s) link, in its serialized form. The
/// parser drops tabs and newlines, so only the serialization is safe to echo.
fn first_url(object: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .find_map(|value| parse_http_url(value.trim()))
        .map(String::from)
}

fn lookup_string(container: &Value, root: &Value, fields: &[&str]) -> Option<String> {
    first_string(container, fields, |_| true)
        .or_else(|| first_string(root, fields, |_| true))
        .map(str::to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn reply(status: u16, content_type: Option<&str>, body: &str) -> UpstreamReply {
        UpstreamReply {
            status: StatusCode::from_u16(status).unwrap(),
            content_type: content_type.map(str::to_string),
            body: Bytes::from(body.to_string()),
            elapsed: Duration::from_millis(5),
        }
    }

    fn json_reply(body: &str) -> UpstreamReply {
        reply(200, Some("application/json"), body)
    }

    #[test]
    fn success_result_shape_is_mapped() {
        let ok = normalize(
            &json_reply(r#"{"success":true,"result":{"downloadUrl":"https://cdn/x.mp3","title":"T"}}"#),
            "mp3",
        )
        .unwrap();
        assert!(ok.status);
        assert_eq!(ok.result.download_url, "https://cdn/x.mp3");
        assert_eq!(ok.metadata.title.as_deref(), Some("T"));
        assert_eq!(ok.result.format.as_deref(), Some("mp3"));
        assert_eq!(ok.metadata.cover, None);
    }

    #[test]
    fn status_data_shape_is_mapped() {
        let ok = normalize(
            &json_reply(
                r#"{"status":true,"data":{"link":"https://cdn/y.mp3","quality":128,"type":"m4a","thumbnail":"https://img/1.jpg","duration":"3:05"}}"#,
            ),
            "mp3",
        )
        .unwrap();
        assert_eq!(ok.result.download_url, "https://cdn/y.mp3");
        assert_eq!(ok.result.quality.as_deref(), Some("128"));
        assert_eq!(ok.result.format.as_deref(), Some("m4a"));
        assert_eq!(ok.metadata.cover.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(ok.metadata.duration, Some(serde_json::json!("3:05")));
    }

    #[test]
    fn download_url_outranks_url() {
        let ok = normalize(
            &json_reply(r#"{"success":true,"result":{"url":"https://a/1","downloadUrl":"https://a/2"}}"#),
            "mp3",
        )
        .unwrap();
        assert_eq!(ok.result.download_url, "https://a/2");
    }

    #[test]
    fn malformed_bodies_always_land_in_failure_shape() {
        let cases = [
            "{}",
            "<!DOCTYPE html><html><body>404</body></html>",
            r#"{"success":false}"#,
            r#"{"success":true,"result":{}}"#,
            r#"{"status":true,"data":{"url":"x"}}"#,
            r#""just a string""#,
            "[1,2,3]",
            "",
            "plain text",
        ];
        for body in cases {
            let err = normalize(&json_reply(body), "mp3").expect_err(body);
            let failure = err.to_failure();
            assert!(!failure.status, "{body}");
            assert!(!failure.error.is_empty(), "{body}");
            assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY, "{body}");
            let value = serde_json::to_value(&failure).unwrap();
            assert!(value.get("result").is_none(), "{body}");
        }
    }

    #[test]
    fn html_page_is_reported_as_markup() {
        let err = normalize(&reply(200, Some("text/html"), "<html><body>oops</body></html>"), "mp3").unwrap_err();
        assert!(err.to_failure().error.contains("HTML"));
    }

    #[test]
    fn upstream_error_status_carries_preview() {
        let body = "x".repeat(PREVIEW_LIMIT * 2);
        let err = normalize(&reply(503, Some("text/plain"), &body), "mp3").unwrap_err();
        let failure = err.to_failure();
        assert_eq!(failure.upstream_status, Some(503));
        assert_eq!(failure.debug.map(|d| d.len()), Some(PREVIEW_LIMIT));
    }

    #[test]
    fn binary_body_is_rejected() {
        let err = normalize(&reply(200, Some("audio/mpeg"), "ID3..."), "mp3").unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamBinary { bytes: 6, .. }));

        let invalid_utf8 = UpstreamReply {
            body: Bytes::from_static(&[0xff, 0xfe, 0x00]),
            ..reply(200, None, "")
        };
        assert!(matches!(
            normalize(&invalid_utf8, "mp3"),
            Err(ProxyError::UpstreamBinary { .. })
        ));
    }

    #[test]
    fn string_encoded_json_is_unwrapped() {
        let body = serde_json::to_string(r#"{"success":true,"result":{"url":"https://cdn/z"}}"#).unwrap();
        let ok = normalize(&json_reply(&body), "mp3").unwrap();
        assert_eq!(ok.result.download_url, "https://cdn/z");
    }

    #[test]
    fn ok_shape_reads_link_from_root() {
        let ok = normalize(&json_reply(r#"{"ok":1,"download":"https://cdn/r","title":"Root"}"#), "mp3").unwrap();
        assert_eq!(ok.result.download_url, "https://cdn/r");
        assert_eq!(ok.metadata.title.as_deref(), Some("Root"));
    }

    #[test]
    fn link_is_returned_in_serialized_form() {
        let ok = normalize(
            &json_reply(r#"{"success":true,"result":{"downloadUrl":"https://cdn/x\n.mp3\t"}}"#),
            "mp3",
        )
        .unwrap();
        assert_eq!(ok.result.download_url, "https://cdn/x.mp3");
    }

    #[test]
    fn truncate_does_not_split_utf8() {
        assert_eq!(truncate_utf8_prefix("a😀b", 2), "a");
        assert_eq!(truncate_utf8_prefix("a😀b", 5), "a😀");
        assert_eq!(truncate_utf8_prefix("abc", 10), "abc");
    }
}
