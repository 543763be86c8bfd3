//! Video identifier extraction.

use std::sync::LazyLock;

use regex::Regex;

static EMBEDDED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("valid regex"));

static BARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Za-z_-]{11})$").expect("valid regex"));

/// Extracts the 11-character video identifier from a watch URL, short link
/// or bare identifier.
///
/// Returns `None` if nothing identifier-shaped is found.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = url.trim();
    [&*EMBEDDED_ID_RE, &*BARE_ID_RE]
        .into_iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns the watch page URL for a video identifier.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
