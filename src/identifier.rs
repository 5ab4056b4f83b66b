//! Validation and canonicalization of YouTube resource identifiers.

use once_cell::sync::Lazy;
use crate::template::COMPONENT;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use regex::Regex;
use url::Url;

static YOUTUBE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?(www\.|m\.|music\.)?(youtube\.com|youtu\.?be)/.+$").unwrap()
});

static SCHEMELESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(youtu\.be|m\.youtube\.com|www\.youtube\.com)/").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    Missing,
    Invalid(String),
}

/// A caller identifier that passed the shape check, with its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub raw: String,
    pub canonical: String,
}

/// Validates `raw` and collapses equivalent link forms into one.
pub fn sanitize(raw: Option<&str>) -> Result<Identifier, IdentifierError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(IdentifierError::Missing);
    }

    let decoded = percent_decode_str(trimmed).decode_utf8_lossy().trim().to_string();
    if !YOUTUBE_REGEX.is_match(&decoded) {
        return Err(IdentifierError::Invalid(trimmed.to_string()));
    }

    Ok(Identifier {
        raw: trimmed.to_string(),
        canonical: canonicalize(&decoded),
    })
}

/// Canonical form of a YouTube link. Input that does not parse is returned
/// unchanged.
pub fn canonicalize(raw: &str) -> String {
    let with_scheme = if SCHEMELESS_REGEX.is_match(raw) {
        format!("https://{raw}")
    } else {
        raw.to_string()
    };

    let url = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("could not parse identifier '{}', forwarding as-is: {}", raw, e);
            return raw.to_string();
        }
    };

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    if host.ends_with("youtu.be") {
        return match segments.first() {
            Some(id) => watch_url(id),
            None => with_scheme,
        };
    }

    if host.ends_with("youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
            return watch_url(&v);
        }
        return match segments.as_slice() {
            ["shorts", id, ..] => format!("https://m.youtube.com/shorts/{}", encode(id)),
            ["embed", id, ..] => watch_url(id),
            _ => format!("{}{}", url.origin().ascii_serialization(), url.path()),
        };
    }

    with_scheme
}

fn watch_url(id: &str) -> String {
    format!("https://m.youtube.com/watch?v={}", encode(id))
}

fn encode(id: &str) -> String {
    let decoded = percent_decode_str(id).decode_utf8_lossy();
    utf8_percent_encode(&decoded, COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_link_becomes_mobile_watch_url() {
        let id = sanitize(Some("https://youtu.be/abc123")).unwrap();
        assert_eq!(id.canonical, "https://m.youtube.com/watch?v=abc123");
    }

    #[test]
    fn equivalent_forms_share_one_canonical_identifier() {
        let forms = [
            "https://youtu.be/abc123?si=tracking",
            "youtu.be/abc123",
            "https://www.youtube.com/watch?v=abc123&t=42",
            "https://youtube.com/embed/abc123",
            "https%3A%2F%2Fm.youtube.com%2Fwatch%3Fv%3Dabc123",
            "  https://m.youtube.com/watch?v=abc123  ",
        ];
        for form in forms {
            let id = sanitize(Some(form)).unwrap_or_else(|e| panic!("{form}: {e:?}"));
            assert_eq!(id.canonical, "https://m.youtube.com/watch?v=abc123", "{form}");
        }
    }

    #[test]
    fn shorts_keep_their_own_form() {
        let id = sanitize(Some("https://www.youtube.com/shorts/PcY3LMfDxmc")).unwrap();
        assert_eq!(id.canonical, "https://m.youtube.com/shorts/PcY3LMfDxmc");
    }

    #[test]
    fn id_punctuation_is_not_escaped() {
        let id = sanitize(Some("https://youtu.be/dQw4w9Wg-c_Q")).unwrap();
        assert_eq!(id.canonical, "https://m.youtube.com/watch?v=dQw4w9Wg-c_Q");
        let short = sanitize(Some("https://youtube.com/shorts/a-b_c")).unwrap();
        assert_eq!(short.canonical, "https://m.youtube.com/shorts/a-b_c");
    }

    #[test]
    fn other_youtube_paths_drop_query() {
        assert_eq!(
            canonicalize("https://www.youtube.com/@channel?feature=x"),
            "https://www.youtube.com/@channel"
        );
    }

    #[test]
    fn missing_and_blank_are_rejected() {
        assert_eq!(sanitize(None), Err(IdentifierError::Missing));
        assert_eq!(sanitize(Some("   ")), Err(IdentifierError::Missing));
    }

    #[test]
    fn foreign_hosts_are_rejected() {
        assert!(matches!(
            sanitize(Some("https://vimeo.com/123")),
            Err(IdentifierError::Invalid(_))
        ));
        assert!(matches!(sanitize(Some("not a url")), Err(IdentifierError::Invalid(_))));
    }

    #[test]
    fn unparseable_identifier_is_forwarded_raw() {
        let raw = "https://youtu.be:99999/abc";
        assert_eq!(canonicalize(raw), raw);
    }
}
