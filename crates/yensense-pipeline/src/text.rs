//! Small helpers for reading model output and formatting numbers

use regex::Regex;
use yensense_core::{Error, Result};

/// Recognises list markers at the start of a line
pub(crate) struct ListMarkers {
    item: Regex,
    bullet: Regex,
}

impl ListMarkers {
    pub(crate) fn new() -> Result<Self> {
        let item = Regex::new(r"^\s*(?:[-*•]|\d+[.)]|[Qq]\d+[.):])\s*")
            .map_err(|e| Error::Generic(format!("invalid list item pattern: {e}")))?;
        let bullet = Regex::new(r"^\s*[-*•]\s+(.*)$")
            .map_err(|e| Error::Generic(format!("invalid bullet pattern: {e}")))?;
        Ok(Self { item, bullet })
    }

    /// Line text without a leading `-`, `*`, `•`, `1.`, `2)` or `Q3:` marker
    /// and without surrounding markdown emphasis
    pub(crate) fn strip_item<'a>(&self, line: &'a str) -> &'a str {
        let rest = match self.item.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        };
        rest.trim().trim_matches('*').trim()
    }

    /// Text of a `-`, `*` or `•` bullet, `None` for any other line
    ///
    /// The marker must be followed by whitespace, so `**Bold**` is not a bullet.
    pub(crate) fn bullet_text<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.bullet
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }
}

/// Round to a fixed number of decimal places
pub(crate) fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `"147.25"` for a value, `"N/A"` when absent
pub(crate) fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// At most `max` characters of `text`, cut on a char boundary
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_item_markers() {
        let markers = ListMarkers::new().unwrap();
        assert_eq!(markers.strip_item("1. Why is USD/JPY high?"), "Why is USD/JPY high?");
        assert_eq!(markers.strip_item("  2) What next?"), "What next?");
        assert_eq!(markers.strip_item("- Is the BOJ done?"), "Is the BOJ done?");
        assert_eq!(markers.strip_item("Q4: Who is short yen?"), "Who is short yen?");
        assert_eq!(markers.strip_item("**What about carry?**"), "What about carry?");
        assert_eq!(markers.strip_item("No marker here?"), "No marker here?");
    }

    #[test]
    fn test_bullet_text() {
        let markers = ListMarkers::new().unwrap();
        assert_eq!(markers.bullet_text("- Data is stale"), Some("Data is stale"));
        assert_eq!(markers.bullet_text("  * Thin liquidity "), Some("Thin liquidity"));
        assert_eq!(markers.bullet_text("• Clear logic"), Some("Clear logic"));
        assert_eq!(markers.bullet_text("**Major issues:**"), None);
        assert_eq!(markers.bullet_text("Strengths:"), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(round_dp(1.079_117, 4), 1.0791);
        assert_eq!(round_dp(1.204_819, 2), 1.2);
        assert_eq!(or_na(Some(147.25)), "147.25");
        assert_eq!(or_na(None), "N/A");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("円安が続く", 2), "円安");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
