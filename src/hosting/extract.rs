//! URL discovery in image host responses.
//!
//! Hosts do not agree on a response schema, so extraction runs an ordered list
//! of probes and falls back to scanning the serialized body for anything that
//! looks like a link.

// lazy_regex! validates the pattern at compile time and uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use serde_json::Value;

/// First `http(s)://` run up to whitespace, a quote or an angle bracket
static RE_URL: lazy_regex::Lazy<lazy_regex::Regex> = lazy_regex!(r#"https?://[^\s"'<>]+"#);

/// A probe tried against a JSON object, in order
enum Probe {
    /// Nested key path ending in a string
    Path(&'static [&'static str]),
    /// Key inside the first element of the `images` list
    FirstImage(&'static str),
}

const PROBES: &[Probe] = &[
    Probe::Path(&["url"]),
    Probe::Path(&["link"]),
    Probe::Path(&["data", "url"]),
    Probe::Path(&["image", "url"]),
    Probe::Path(&["result", "url"]),
    Probe::Path(&["result", "link"]),
    Probe::FirstImage("url"),
    Probe::FirstImage("link"),
    Probe::FirstImage("src"),
];

impl Probe {
    fn apply<'a>(&self, object: &'a Value) -> Option<&'a str> {
        match self {
            Self::Path(path) => path
                .iter()
                .try_fold(object, |current, key| current.as_object()?.get(*key))?
                .as_str(),
            Self::FirstImage(key) => object
                .get("images")?
                .as_array()?
                .first()?
                .as_object()?
                .get(*key)?
                .as_str(),
        }
    }
}

/// Response body as received from the host
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body parsed as JSON
    Json(Value),
    /// Body that is not valid JSON
    Text(String),
}

impl ResponseBody {
    /// Parse body text as JSON, keeping it as opaque text on failure
    #[must_use]
    pub fn parse(text: String) -> Self {
        serde_json::from_str(&text).map_or(Self::Text(text), Self::Json)
    }
}

impl std::fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Locate the most plausible hosted-image URL in a response body
///
/// # Examples
///
/// ```
/// use lookmyimg_bot::hosting::{extract_url, ResponseBody};
///
/// let body = ResponseBody::Text("done: https://lookmyimg.com/i/abc.png".to_string());
/// assert_eq!(extract_url(&body).as_deref(), Some("https://lookmyimg.com/i/abc.png"));
/// ```
#[must_use]
pub fn extract_url(body: &ResponseBody) -> Option<String> {
    match body {
        ResponseBody::Json(value) => extract_url_from_value(value),
        ResponseBody::Text(text) => scan_for_url(text),
    }
}

/// Locate a URL in an already parsed JSON value
#[must_use]
pub fn extract_url_from_value(value: &Value) -> Option<String> {
    if value.is_object() {
        if let Some(url) = PROBES.iter().find_map(|probe| probe.apply(value)) {
            return Some(url.to_string());
        }
    }
    scan_for_url(&value.to_string())
}

fn scan_for_url(text: &str) -> Option<String> {
    RE_URL.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_shapes() {
        let x = "https://lookmyimg.com/i/X.png";
        for body in [
            json!({"data": {"url": x}}),
            json!({"url": x}),
            json!({"result": {"link": x}}),
            json!({"images": [{"src": x}]}),
            json!({"image": {"url": x, "display_url": "https://other"}}),
        ] {
            assert_eq!(extract_url_from_value(&body).as_deref(), Some(x), "{body}");
        }
    }

    #[test]
    fn test_probe_order_prefers_top_level() {
        let body = json!({
            "data": {"url": "https://b.example/2"},
            "link": "https://a.example/1"
        });
        assert_eq!(
            extract_url_from_value(&body).as_deref(),
            Some("https://a.example/1")
        );
    }

    #[test]
    fn test_non_string_terminal_skips_probe() {
        let body = json!({"url": 42, "result": {"link": "https://r.example/ok"}});
        assert_eq!(
            extract_url_from_value(&body).as_deref(),
            Some("https://r.example/ok")
        );
    }

    #[test]
    fn test_images_probe_key_order() {
        let body = json!({"images": [{"src": "https://s.example/s", "link": "https://s.example/l"}]});
        assert_eq!(
            extract_url_from_value(&body).as_deref(),
            Some("https://s.example/l")
        );
    }

    #[test]
    fn test_regex_fallback_on_unknown_shape() {
        let body = json!({"status": "ok", "payload": {"medium": {"href": "https://host/path"}}});
        assert_eq!(
            extract_url_from_value(&body).as_deref(),
            Some("https://host/path")
        );
    }

    #[test]
    fn test_regex_stops_at_delimiters() {
        let body = ResponseBody::Text("<a href='https://host/path'>x</a>".to_string());
        assert_eq!(extract_url(&body).as_deref(), Some("https://host/path"));
    }

    #[test]
    fn test_absent_url() {
        assert_eq!(extract_url_from_value(&json!({"status": 200})), None);
        assert_eq!(extract_url_from_value(&json!([1, 2, 3])), None);
        assert_eq!(extract_url_from_value(&Value::Null), None);
        assert_eq!(extract_url(&ResponseBody::Text(String::new())), None);
    }

    #[test]
    fn test_parse_falls_back_to_text() {
        assert_eq!(
            ResponseBody::parse("not json".to_string()),
            ResponseBody::Text("not json".to_string())
        );
        assert_eq!(
            ResponseBody::parse(r#"{"url":"https://x"}"#.to_string()),
            ResponseBody::Json(json!({"url": "https://x"}))
        );
    }
}
