//! Cache Response Headers
//!
//! Header convention for HTTP-facing integrations: `Cache-Control` with
//! stale directives, validators (`ETag`, `Last-Modified`), `Vary`,
//! `X-Cache: HIT|STALE|MISS` and `Age`.

use crate::domain::entities::CacheEntry;
use crate::domain::value_objects::{CacheOutcome, Validators};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use platform::httpdate::format_http_date;

pub const X_CACHE: &str = "x-cache";

/// Apply the full cache header set for a served entry
pub fn apply_cache_headers(
    headers: &mut HeaderMap,
    entry: &CacheEntry,
    outcome: CacheOutcome,
    now_ms: i64,
    stale_if_error_secs: u64,
) {
    let ttl_secs = entry.ttl_ms / 1000;
    let stale_secs = entry.stale_window_ms / 1000;
    insert(
        headers,
        "cache-control",
        format!(
            "max-age={}, s-maxage={}, stale-while-revalidate={}, stale-if-error={}",
            ttl_secs, ttl_secs, stale_secs, stale_if_error_secs
        ),
    );
    insert(headers, "etag", entry.etag.clone());
    if let Some(date) = format_http_date(entry.last_modified_ms) {
        insert(headers, "last-modified", date);
    }
    if !entry.vary.is_empty() {
        let names: Vec<&str> = entry.vary.iter().map(|(name, _)| name.as_str()).collect();
        insert(headers, "vary", names.join(", "));
    }
    insert(headers, X_CACHE, outcome.as_str().to_string());
    insert(headers, "age", entry.age_secs(now_ms).to_string());
}

/// Validators for a 304 Not Modified response
pub fn apply_not_modified_headers(headers: &mut HeaderMap, validators: &Validators) {
    insert(headers, "etag", validators.etag.clone());
    if let Some(date) = format_http_date(validators.last_modified_ms) {
        insert(headers, "last-modified", date);
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Fingerprint;

    fn entry() -> CacheEntry {
        CacheEntry {
            fingerprint: Fingerprint::from_route_digest("/clients", "d"),
            route: "/clients".to_string(),
            query: vec![],
            vary: vec![("accept".to_string(), "application/json".to_string())],
            status: 200,
            headers: vec![],
            body: b"{}".to_vec(),
            created_at_ms: 0,
            ttl_ms: 300_000,
            stale_window_ms: 60_000,
            etag: "\"abc\"".to_string(),
            last_modified_ms: 0,
            tags: vec![],
        }
    }

    #[test]
    fn test_cache_headers() {
        let mut headers = HeaderMap::new();
        apply_cache_headers(&mut headers, &entry(), CacheOutcome::Stale, 12_000, 300);

        assert_eq!(
            headers.get("cache-control").unwrap(),
            "max-age=300, s-maxage=300, stale-while-revalidate=60, stale-if-error=300"
        );
        assert_eq!(headers.get("etag").unwrap(), "\"abc\"");
        assert_eq!(headers.get(X_CACHE).unwrap(), "STALE");
        assert_eq!(headers.get("age").unwrap(), "12");
        assert_eq!(headers.get("vary").unwrap(), "accept");
        assert!(headers.get("last-modified").is_some());
    }
}
