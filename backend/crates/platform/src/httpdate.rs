//! HTTP date formatting
//!
//! IMF-fixdate (RFC 9110 §5.6.7) formatting and parsing for Last-Modified
//! and If-Modified-Since headers. Internally all timestamps are epoch
//! milliseconds; the HTTP surface is the only place dates are rendered.

use chrono::{DateTime, TimeZone, Utc};

/// Format epoch milliseconds as an IMF-fixdate string,
/// e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
///
/// Returns `None` for timestamps outside chrono's representable range.
pub fn format_http_date(epoch_ms: i64) -> Option<String> {
    let dt = Utc.timestamp_millis_opt(epoch_ms).single()?;
    Some(dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// Parse an HTTP date header value into epoch milliseconds.
///
/// Accepts RFC 2822-compatible dates, which covers IMF-fixdate. Sub-second
/// precision is not part of the format, so the result is second-aligned.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
