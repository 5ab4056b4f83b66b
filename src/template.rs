//! Splitting endpoint paths into a base path and query values, rendering the
//! display template, and rebuilding a concrete request URL.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use url::Url;

/// Origin used to resolve root-relative paths. Never shown to the user.
const PARSE_ORIGIN: &str = "http://localhost";

/// Same reserved set as `encodeURIComponent`.
pub const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A path broken into its base and its query values, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPath {
    pub base_path: String,
    pub params: Vec<(String, String)>,
}

impl SplitPath {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits `path` into base path and query values. Unparseable input comes
/// back whole as the base path with no parameters.
pub fn split(path: &str) -> SplitPath {
    let fallback = || SplitPath {
        base_path: path.to_string(),
        params: Vec::new(),
    };

    let absolute = Url::parse(path).is_ok();
    let parsed = match Url::parse(PARSE_ORIGIN).and_then(|origin| origin.join(path)) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("treating '{}' as an opaque path: {}", path, e);
            return fallback();
        }
    };

    let base_path = if absolute {
        let mut base = parsed.clone();
        base.set_query(None);
        base.set_fragment(None);
        base.to_string()
    } else {
        parsed.path().to_string()
    };

    let params = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    SplitPath { base_path, params }
}

/// Display form of `path`: schema keys become `{key}` placeholders, all other
/// keys keep their literal value. Meant for copy-paste guidance only.
pub fn to_template(path: &str, schema: Option<&BTreeMap<String, String>>) -> String {
    let split = split(path);
    if split.params.is_empty() {
        return split.base_path;
    }

    let query = split
        .params
        .iter()
        .map(|(key, value)| {
            if schema.is_some_and(|s| s.contains_key(key)) {
                format!("{key}={{{key}}}")
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", split.base_path, query)
}

/// Rebuilds `base_path?query`, percent-encoding every value and skipping the
/// ones that are `None`. No `?` is appended when nothing remains.
pub fn to_request_url<'a, I>(base_path: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let query = params
        .into_iter()
        .filter_map(|(key, value)| {
            value.map(|v| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, COMPONENT),
                    utf8_percent_encode(v, COMPONENT)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        base_path.to_string()
    } else {
        format!("{base_path}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn schema(keys: &[&str]) -> BTreeMap<String, String> {
        keys.iter()
            .map(|k| (k.to_string(), format!("hint for {k}")))
            .collect()
    }

    fn query_set(url: &str) -> BTreeSet<(String, String)> {
        split(url).params.into_iter().collect()
    }

    #[test]
    fn split_root_relative_path() {
        let split = split("/api/download/ytmp3?url=https%3A%2F%2Fyoutu.be%2Fabc&format=mp3");
        assert_eq!(split.base_path, "/api/download/ytmp3");
        assert_eq!(split.get("url"), Some("https://youtu.be/abc"));
        assert_eq!(split.get("format"), Some("mp3"));
    }

    #[test]
    fn split_absolute_url_keeps_origin() {
        let split = split("https://example.com/v1/search?q=cats");
        assert_eq!(split.base_path, "https://example.com/v1/search");
        assert_eq!(split.params, vec![("q".to_string(), "cats".to_string())]);
    }

    #[test]
    fn split_without_query_has_no_params() {
        let split = split("/api/ping");
        assert_eq!(split.base_path, "/api/ping");
        assert!(split.params.is_empty());
    }

    #[test]
    fn split_unparseable_input_falls_back_to_whole_string() {
        for raw in ["http://[::1/api?x=1", "https://exa mple.com/api?x=1"] {
            let split = split(raw);
            assert_eq!(split.base_path, raw);
            assert!(split.params.is_empty());
        }
    }

    #[test]
    fn template_marks_only_declared_keys() {
        let path = "/api/search?q=cats&limit=10&lang=en";
        let template = to_template(path, Some(&schema(&["q", "lang"])));
        assert_eq!(template, "/api/search?q={q}&limit=10&lang={lang}");
        assert_eq!(template.matches('{').count(), 2);
    }

    #[test]
    fn template_without_schema_is_all_literal() {
        let template = to_template("/api/search?q=cats", None);
        assert_eq!(template, "/api/search?q=cats");
    }

    #[test]
    fn request_url_skips_missing_values_and_encodes() {
        let url = to_request_url(
            "/api/download/ytmp3",
            [("url", Some("https://youtu.be/a b")), ("direct", None)],
        );
        assert_eq!(url, "/api/download/ytmp3?url=https%3A%2F%2Fyoutu.be%2Fa%20b");
    }

    #[test]
    fn request_url_without_params_is_base_path() {
        assert_eq!(to_request_url("/api/ping", std::iter::empty()), "/api/ping");
    }

    #[test]
    fn split_then_rebuild_reproduces_parameter_set() {
        let path = "/api/tools?b=2&a=hello%20world&c=";
        let parts = split(path);
        let rebuilt = to_request_url(
            &parts.base_path,
            parts.params.iter().map(|(k, v)| (k.as_str(), Some(v.as_str()))),
        );
        let again = split(&rebuilt);
        assert_eq!(again.base_path, parts.base_path);
        assert_eq!(query_set(&rebuilt), query_set(path));
    }
}
