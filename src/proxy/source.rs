//! Resolution of the source URL from the `url` parameter(s).

use std::sync::LazyLock;

use regex::Regex;

/// Prefix added by a compatible upstream proxy layer (`http://1.1.x.x/bmi/...`).
static CHAINED_PROXY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^http://1\.1\.\d\.\d/bmi/(https?://)?").expect("static regex is valid")
});

/// Join the `url` fragments into the URL to fetch.
///
/// Returns `None` when there is nothing to fetch.
pub fn resolve_source_url(fragments: &[String]) -> Option<String> {
    if fragments.iter().all(|f| f.is_empty()) {
        return None;
    }

    let joined = fragments.join("&url=");
    let decoded = decode_json_list(&joined).unwrap_or(joined);
    let normalized = CHAINED_PROXY_PREFIX
        .replace(&decoded, "http://")
        .into_owned();

    if normalized.trim().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// A JSON array is joined with `&url=`, a JSON string is unwrapped; anything
/// else (including invalid JSON) is left to the caller.
fn decode_json_list(raw: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(raw).ok()? {
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&url="),
        ),
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}
