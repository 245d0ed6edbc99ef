//! Process-wide counters for the adjustment workflow.
//! Read through [`snapshot`] by the periodic stats log and the `status` command.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static ADJUSTMENTS_APPLIED: AtomicU64 = AtomicU64::new(0);
static ADJUSTMENTS_REJECTED: AtomicU64 = AtomicU64::new(0);
static ADJUSTMENTS_CANCELLED: AtomicU64 = AtomicU64::new(0);
static INVALID_AMOUNTS: AtomicU64 = AtomicU64::new(0);
static SESSIONS_STARTED: AtomicU64 = AtomicU64::new(0);
static SESSIONS_EXPIRED: AtomicU64 = AtomicU64::new(0);
static AUDIT_DELIVERED: AtomicU64 = AtomicU64::new(0);
static AUDIT_FAILED: AtomicU64 = AtomicU64::new(0);
static STORE_ERRORS: AtomicU64 = AtomicU64::new(0);
static STORE_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static STORE_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn inc_adjustments_applied() {
    ADJUSTMENTS_APPLIED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_adjustments_rejected() {
    ADJUSTMENTS_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_adjustments_cancelled() {
    ADJUSTMENTS_CANCELLED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_invalid_amounts() {
    INVALID_AMOUNTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sessions_started() {
    SESSIONS_STARTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sessions_expired() {
    SESSIONS_EXPIRED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_audit_delivered() {
    AUDIT_DELIVERED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_audit_failed() {
    AUDIT_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_store_errors() {
    STORE_ERRORS.fetch_add(1, Ordering::Relaxed);
}

/// Record how long one store round trip took.
pub fn observe_store_latency(started: Instant) {
    let ms = started.elapsed().as_millis() as u64;
    STORE_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    STORE_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub adjustments_applied: u64,
    pub adjustments_rejected: u64,
    pub adjustments_cancelled: u64,
    pub invalid_amounts: u64,
    pub sessions_started: u64,
    pub sessions_expired: u64,
    pub audit_delivered: u64,
    pub audit_failed: u64,
    pub store_errors: u64,
    pub store_latency_avg_ms: Option<u64>,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "applied={} rejected={} cancelled={} invalid_amounts={} sessions={} expired={} audit_ok={} audit_failed={} store_errors={} store_avg_ms={}",
            self.adjustments_applied,
            self.adjustments_rejected,
            self.adjustments_cancelled,
            self.invalid_amounts,
            self.sessions_started,
            self.sessions_expired,
            self.audit_delivered,
            self.audit_failed,
            self.store_errors,
            self.store_latency_avg_ms
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }
}

pub fn snapshot() -> Snapshot {
    let sum = STORE_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = STORE_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        adjustments_applied: ADJUSTMENTS_APPLIED.load(Ordering::Relaxed),
        adjustments_rejected: ADJUSTMENTS_REJECTED.load(Ordering::Relaxed),
        adjustments_cancelled: ADJUSTMENTS_CANCELLED.load(Ordering::Relaxed),
        invalid_amounts: INVALID_AMOUNTS.load(Ordering::Relaxed),
        sessions_started: SESSIONS_STARTED.load(Ordering::Relaxed),
        sessions_expired: SESSIONS_EXPIRED.load(Ordering::Relaxed),
        audit_delivered: AUDIT_DELIVERED.load(Ordering::Relaxed),
        audit_failed: AUDIT_FAILED.load(Ordering::Relaxed),
        store_errors: STORE_ERRORS.load(Ordering::Relaxed),
        store_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-wide and other tests bump them concurrently,
    // so only monotonic growth is asserted.
    #[test]
    fn counters_only_grow() {
        let before = snapshot();
        inc_adjustments_applied();
        inc_audit_failed();
        observe_store_latency(Instant::now());
        let after = snapshot();
        assert!(after.adjustments_applied > before.adjustments_applied);
        assert!(after.audit_failed > before.audit_failed);
        assert!(after.store_latency_avg_ms.is_some());
    }

    #[test]
    fn snapshot_display_is_single_line() {
        let text = snapshot().to_string();
        assert!(text.starts_with("applied="));
        assert!(!text.contains('\n'));
    }
}
