//! Domain Services
//!
//! Pure admission-control math: fixed-window alignment, retry hints,
//! usage ratios and warning levels. Everything here takes explicit
//! timestamps so the functions stay deterministic under test.

use crate::domain::entities::TenantLimitProfile;
use crate::domain::value_objects::{RateLimitPolicy, WindowKind};

/// Start of the fixed window containing `now_ms`.
///
/// Fixed windows reset at aligned boundaries; a burst straddling the
/// boundary can approach twice the nominal rate. Accepted trade-off for
/// O(1) counters.
pub fn window_start_ms(now_ms: i64, window_ms: i64) -> i64 {
    now_ms - now_ms.rem_euclid(window_ms)
}

/// Instant the current window's counter resets
pub fn reset_at_ms(now_ms: i64, window_ms: i64) -> i64 {
    window_start_ms(now_ms, window_ms) + window_ms
}

/// Seconds a rejected caller should wait before retrying, rounded up,
/// never less than one
pub fn retry_after_secs(now_ms: i64, reset_at_ms: i64) -> u64 {
    let remaining_ms = (reset_at_ms - now_ms).max(0);
    (((remaining_ms + 999) / 1000) as u64).max(1)
}

/// Fraction of the window budget consumed
pub fn usage_ratio(current: u64, limit: u32) -> f64 {
    if limit == 0 {
        return 1.0;
    }
    current as f64 / limit as f64
}

/// Warning level for one window's usage ratio.
///
/// Longer windows warn later: a minute window at 80% is an active burst,
/// a day window at 80% is normal mid-day consumption.
pub fn warning_level(kind: WindowKind, ratio: f64) -> u8 {
    let thresholds = match kind {
        WindowKind::Minute => [0.40, 0.60, 0.80],
        WindowKind::Hour => [0.60, 0.75, 0.90],
        WindowKind::Day => [0.70, 0.85, 0.95],
    };
    if ratio >= thresholds[2] {
        3
    } else if ratio >= thresholds[1] {
        2
    } else if ratio >= thresholds[0] {
        1
    } else {
        0
    }
}

/// Apply a tenant's overrides to a base policy.
///
/// Overrides replace matching fields only: the budget is replaced when the
/// profile carries an override for the base policy's window, everything
/// else is kept from the base policy.
pub fn resolve_effective_limit(
    base: &RateLimitPolicy,
    profile: &TenantLimitProfile,
) -> RateLimitPolicy {
    let Some(kind) = WindowKind::from_window_ms(base.window_ms()) else {
        return *base;
    };
    let overridden = profile.overrides.as_ref().and_then(|o| match kind {
        WindowKind::Minute => o.per_minute,
        WindowKind::Hour => o.per_hour,
        WindowKind::Day => o.per_day,
    });
    match overridden {
        Some(max_requests) => base.with_max_requests(max_requests),
        None => *base,
    }
}
