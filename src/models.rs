use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// === Catalog Models ===

/// HTTP verb declared by a descriptor. Only GET is executed end-to-end.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// One invocable HTTP operation listed in the console.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub method: Method,
    /// Parameter name -> human readable hint. `None` means no editable parameters.
    #[serde(default)]
    pub params: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub desc: String,
}

impl EndpointDescriptor {
    /// Ad-hoc GET descriptor for a URL typed by the user.
    pub fn custom(url: impl Into<String>) -> Self {
        EndpointDescriptor {
            name: "Custom Request".to_string(),
            path: url.into(),
            method: Method::Get,
            params: None,
            desc: "Manual URL Request".to_string(),
        }
    }

    pub fn declares(&self, key: &str) -> bool {
        self.params.as_ref().is_some_and(|p| p.contains_key(key))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub items: Vec<EndpointDescriptor>,
}

// === Proxy Request/Response Models ===

/// The query parameters for a `GET /api/download/ytmp3` request.
#[derive(Debug, Default)]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub direct: Option<String>,
}

impl ProxyQuery {
    /// Parses a raw query string. Repeated keys keep their first value.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let mut query = ProxyQuery::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "url" if query.url.is_none() => query.url = Some(value.into_owned()),
                "direct" if query.direct.is_none() => query.direct = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }

    /// `direct=1` or `direct=true` asks for a redirect instead of a JSON body.
    pub fn wants_redirect(&self) -> bool {
        matches!(
            self.direct.as_deref().map(str::trim),
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true")
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub duration: Option<serde_json::Value>,
    pub cover: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub download_url: String,
    pub quality: Option<String>,
    pub format: Option<String>,
}

/// Success shape of the normalized contract. `status` is always `true`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProxySuccess {
    pub status: bool,
    pub metadata: Metadata,
    pub result: DownloadResult,
}

impl ProxySuccess {
    pub fn new(metadata: Metadata, result: DownloadResult) -> Self {
        ProxySuccess {
            status: true,
            metadata,
            result,
        }
    }
}

/// Failure shape of the normalized contract. `status` is always `false` and
/// there is never a `result` field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyFailure {
    pub status: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    /// Bounded preview of the raw upstream body. Diagnostic only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

// === History Models ===

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub name: String,
    pub path: String,
    pub time: chrono::DateTime<chrono::Utc>,
}
