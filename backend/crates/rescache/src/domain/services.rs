//! Domain Services
//!
//! Pure response-cache logic: request fingerprinting, freshness
//! classification and conditional-request validation.

use crate::domain::entities::CacheEntry;
use crate::domain::value_objects::{Fingerprint, Freshness};
use platform::crypto;

/// Digest length kept in the fingerprint (128 bits hex)
const DIGEST_LEN: usize = 32;

/// Compute the fingerprint for a logical request.
///
/// The canonical form sorts query pairs and vary header pairs (names
/// lowercased), so parameter and header ordering never changes the
/// identity of a request.
pub fn compute_fingerprint(
    route: &str,
    query: &[(String, String)],
    vary: &[(String, String)],
) -> Fingerprint {
    let mut query_pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    query_pairs.sort();

    let mut vary_pairs: Vec<String> = vary
        .iter()
        .map(|(name, value)| format!("{}={}", name.to_ascii_lowercase(), value))
        .collect();
    vary_pairs.sort();

    let canonical = format!(
        "{}\n{}\n{}",
        route,
        query_pairs.join("&"),
        vary_pairs.join("&")
    );
    let digest = crypto::sha256_hex(canonical.as_bytes());
    Fingerprint::from_route_digest(route, &digest[..DIGEST_LEN])
}

/// Classify an entry's freshness at `now_ms`
pub fn classify(entry: &CacheEntry, now_ms: i64) -> Freshness {
    let age_ms = entry.age_ms(now_ms);
    if age_ms < entry.ttl_ms {
        Freshness::Fresh
    } else if age_ms < entry.total_lifetime_ms() {
        Freshness::Stale
    } else {
        Freshness::Expired
    }
}

/// Strong content-hash ETag, quoted for the wire
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{}\"", &crypto::sha256_hex(body)[..DIGEST_LEN])
}

/// Whether an `If-None-Match` header matches a stored ETag.
///
/// Handles comma-separated candidate lists, weak validators (`W/` prefix,
/// compared by value per RFC 9110 weak comparison) and `*`.
pub fn etag_matches(stored: &str, if_none_match: &str) -> bool {
    let stored = stored.trim().trim_start_matches("W/");
    if_none_match.split(',').any(|candidate| {
        let candidate = candidate.trim().trim_start_matches("W/");
        candidate == "*" || candidate == stored
    })
}

/// Conditional check against a stored entry.
///
/// "Not modified" when the supplied ETag matches, or (absent an ETag
/// candidate) when the entry was last modified at or before the supplied
/// time. HTTP dates are second-aligned, so the comparison truncates to
/// seconds.
pub fn is_not_modified(
    entry: &CacheEntry,
    if_none_match: Option<&str>,
    if_modified_since_ms: Option<i64>,
) -> bool {
    if let Some(candidates) = if_none_match {
        return etag_matches(&entry.etag, candidates);
    }
    if let Some(since_ms) = if_modified_since_ms {
        return entry.last_modified_ms / 1000 <= since_ms / 1000;
    }
    false
}
