//! Violation Monitor
//!
//! Debounces repeated violations into alerts. The state is an in-process
//! bounded map, constructor-injected so each service instance (and each
//! test) owns its own counters. Not persisted: counts reset on restart,
//! which is a documented limitation.

use crate::application::config::QuotaConfig;
use crate::domain::entities::{Alert, ViolationRecord};
use crate::domain::repository::AlertSink;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

struct ViolationState {
    count: u32,
    last_alert_ms: i64,
    last_seen_ms: i64,
}

/// In-process violation aggregation
pub struct ViolationMonitor {
    entries: Mutex<HashMap<String, ViolationState>>,
    threshold: u32,
    alert_interval_ms: i64,
    capacity: usize,
}

impl ViolationMonitor {
    pub fn new(threshold: u32, alert_interval_ms: i64, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold: threshold.max(1),
            alert_interval_ms,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(
            config.violation_threshold,
            config.alert_interval_ms(),
            config.monitor_capacity,
        )
    }

    /// Record one violation; returns an alert when the scope has violated
    /// at least `threshold` times and no alert fired within the interval.
    /// Firing resets the scope's count.
    pub fn record(&self, record: &ViolationRecord, now_ms: i64) -> Option<Alert> {
        let key = record.monitor_key();
        let mut entries = self.entries.lock();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let idle_cutoff_ms = now_ms - self.alert_interval_ms * 2;
            entries.retain(|_, state| state.last_seen_ms > idle_cutoff_ms);
            if entries.len() >= self.capacity {
                // Saturated even after pruning; alerting for new scopes
                // degrades before admission does
                tracing::warn!(capacity = self.capacity, "Violation monitor saturated");
                return None;
            }
        }

        let state = entries.entry(key.clone()).or_insert(ViolationState {
            count: 0,
            last_alert_ms: 0,
            last_seen_ms: now_ms,
        });
        state.count += 1;
        state.last_seen_ms = now_ms;

        if state.count >= self.threshold && now_ms - state.last_alert_ms > self.alert_interval_ms {
            let count = state.count;
            state.count = 0;
            state.last_alert_ms = now_ms;
            return Some(Alert {
                id: Uuid::new_v4(),
                at_ms: now_ms,
                monitor_key: key,
                tenant_id: record.tenant_id.clone(),
                user_id: record.user_id.clone(),
                violation_count: count,
            });
        }
        None
    }

    /// Number of scopes currently tracked
    pub fn tracked_scopes(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Alert sink writing to the tracing pipeline
#[derive(Debug, Clone, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    async fn emit_alert(&self, alert: Alert) {
        tracing::warn!(
            alert_id = %alert.id,
            monitor_key = %alert.monitor_key,
            violation_count = alert.violation_count,
            "Repeated quota violations"
        );
    }
}
