//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert a server timestamp in decimal seconds (`"1700000000.25"`) into
/// milliseconds.
///
/// Returns `None` for negative, non-finite, or unparsable values.
pub fn seconds_to_millis(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((value * 1000.0).round() as u64)
}

/// Parse a decimal-seconds header value into milliseconds.
pub fn parse_seconds_header(value: &str) -> Option<u64> {
    value.trim().parse::<f64>().ok().and_then(seconds_to_millis)
}

/// Render milliseconds as the decimal-seconds form used in storage queries.
pub fn millis_to_seconds_param(millis: u64) -> String {
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn seconds_header_parses_fractional_values() {
        assert_eq!(parse_seconds_header("1700000000.25"), Some(1_700_000_000_250));
        assert_eq!(parse_seconds_header(" 12 "), Some(12_000));
        assert_eq!(parse_seconds_header("-1"), None);
        assert_eq!(parse_seconds_header("soon"), None);
    }

    #[test]
    fn millis_render_as_decimal_seconds() {
        assert_eq!(millis_to_seconds_param(1_700_000_000_250), "1700000000.250");
        assert_eq!(millis_to_seconds_param(0), "0.000");
        assert_eq!(millis_to_seconds_param(1005), "1.005");
    }
}
