//! Ordered lookup of a resource link inside a JSON payload of unknown shape.
//!
//! A probe table is a list of containers and a list of field names. Containers
//! are tried in order and, within each, fields are tried in order; the first
//! acceptable string wins. New upstream shapes are added as table rows.

use serde_json::Value;

/// Where to look inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// A named child object of the payload root.
    Field(&'static str),
    /// The payload root itself.
    Root,
}

impl Container {
    pub fn resolve<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        match self {
            Container::Field(name) => payload.get(*name).filter(|v| v.is_object()),
            Container::Root => Some(payload).filter(|v| v.is_object()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeTable {
    pub containers: &'static [Container],
    pub fields: &'static [&'static str],
}

/// Console link search: `result`, then `data`, then the root; `url`, `link`,
/// `download` in each.
pub const CONSOLE_LINK_PROBES: ProbeTable = ProbeTable {
    containers: &[Container::Field("result"), Container::Field("data"), Container::Root],
    fields: &["url", "link", "download"],
};

/// Link fields read from an upstream result container.
pub const UPSTREAM_LINK_FIELDS: &[&str] = &["downloadUrl", "url", "link", "download"];

impl ProbeTable {
    /// First non-empty string for which `accept` holds.
    pub fn find<'a>(&self, payload: &'a Value, accept: impl Fn(&str) -> bool) -> Option<&'a str> {
        self.containers
            .iter()
            .filter_map(|container| container.resolve(payload))
            .find_map(|object| first_string(object, self.fields, &accept))
    }
}

/// First non-empty string among `fields` of `object` accepted by `accept`.
pub fn first_string<'a>(
    object: &'a Value,
    fields: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty() && accept(value))
}

pub fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resource link surfaced in the console for a structured response.
pub fn extract_resource_link(payload: &Value) -> Option<String> {
    CONSOLE_LINK_PROBES
        .find(payload, has_http_scheme)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_wins_over_link_in_same_container() {
        let payload = json!({ "result": { "link": "https://b", "url": "https://a" } });
        assert_eq!(extract_resource_link(&payload).as_deref(), Some("https://a"));
    }

    #[test]
    fn result_container_wins_over_data_and_root() {
        let payload = json!({
            "url": "https://root",
            "data": { "url": "https://data" },
            "result": { "download": "https://result" }
        });
        assert_eq!(extract_resource_link(&payload).as_deref(), Some("https://result"));
    }

    #[test]
    fn non_http_values_are_skipped() {
        let payload = json!({ "result": { "url": "ftp://x", "link": "" }, "data": { "link": "HTTPS://cdn/a" } });
        assert_eq!(extract_resource_link(&payload).as_deref(), Some("HTTPS://cdn/a"));
    }

    #[test]
    fn no_match_is_none() {
        assert_eq!(extract_resource_link(&json!({ "result": "https://x" })), None);
        assert_eq!(extract_resource_link(&json!([1, 2])), None);
        assert_eq!(extract_resource_link(&json!({ "ok": true })), None);
    }

    #[test]
    fn upstream_fields_prefer_download_url() {
        let result = json!({ "url": "https://u", "downloadUrl": "https://d" });
        assert_eq!(first_string(&result, UPSTREAM_LINK_FIELDS, |_| true), Some("https://d"));
    }
}
