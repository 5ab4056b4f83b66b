//! Classifies a console response and turns it into displayable lines.

use crate::blob::{format_bytes, BlobRef, BlobStore};
use crate::link::extract_resource_link;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static ERROR_PAGE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<!doctype html|<html|404").unwrap());

const ERROR_PAGE_MESSAGE: &str = "Server returned an HTML page (probably a 404 or an error page).";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            Some(MediaKind::Image)
        } else if ct.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else if ct.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Classified response body, before any blob has been created.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Media { kind: MediaKind, mime: String, body: Bytes },
    Json { pretty: String, link: Option<String> },
    ErrorPage,
    Text(String),
}

/// Classifies a body by its declared content type, then by content.
pub fn classify(content_type: Option<&str>, body: Bytes) -> Payload {
    if let Some(ct) = content_type {
        if let Some(kind) = MediaKind::from_content_type(ct) {
            let mime = ct.split(';').next().unwrap_or(ct).trim().to_string();
            return Payload::Media { kind, mime, body };
        }
    }

    let text = String::from_utf8_lossy(&body);
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string());
            Payload::Json {
                link: extract_resource_link(&value),
                pretty,
            }
        }
        Err(_) if ERROR_PAGE_REGEX.is_match(&text) => Payload::ErrorPage,
        Err(_) => Payload::Text(text.into_owned()),
    }
}

/// What the console shows for a finished request.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Media { kind: MediaKind, blob: BlobRef },
    Json { pretty: String, link: Option<String> },
    Text(String),
    Error(String),
}

impl View {
    /// Creates the blob for media payloads. A failed blob degrades to text.
    pub fn materialize(payload: Payload, blobs: &mut BlobStore) -> View {
        match payload {
            Payload::Media { kind, mime, body } => match blobs.create(&mime, body) {
                Ok(blob) => View::Media { kind, blob },
                Err(e) => {
                    tracing::warn!("media preview unavailable: {}", e);
                    View::Text(format!("{} ({}) could not be previewed: {}", kind.label(), mime, e))
                }
            },
            Payload::Json { pretty, link } => View::Json { pretty, link },
            Payload::ErrorPage => View::Text(ERROR_PAGE_MESSAGE.to_string()),
            Payload::Text(text) => View::Text(text),
        }
    }

    pub fn blob(&self) -> Option<&BlobRef> {
        match self {
            View::Media { blob, .. } => Some(blob),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            View::Json { link, .. } => link.as_deref(),
            _ => None,
        }
    }
}

/// A finished request as held by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub view: View,
}

impl ResultView {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(match (self.status, &self.view) {
            (_, View::Error(_)) => "Request Error".to_string(),
            (Some(status), _) => format!("Status: {} ({}ms)", status, self.elapsed.as_millis()),
            (None, _) => format!("({}ms)", self.elapsed.as_millis()),
        });

        match &self.view {
            View::Media { kind, blob } => {
                lines.push(format!(
                    "[{} preview] {} · {} · {}",
                    kind.label(),
                    blob.mime,
                    format_bytes(blob.len as u64),
                    blob.uri()
                ));
                lines.push("  save      write this media to the download directory".to_string());
            }
            View::Json { pretty, link } => {
                lines.extend(pretty.lines().map(str::to_string));
                if let Some(link) = link {
                    lines.push(String::new());
                    lines.push(format!("Resource link: {}", link));
                    lines.push("  link open      open in the system browser".to_string());
                    lines.push("  link download  save to the download directory".to_string());
                }
            }
            View::Text(text) | View::Error(text) => lines.extend(text.lines().map(str::to_string)),
        }
        lines
    }
}
