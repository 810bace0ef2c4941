//! Global atomic counters for the rule engine.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as one `tracing::info!` event
//! (the CLI does so before exiting).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    rules_evaluated: AtomicU64,
    actions_executed: AtomicU64,
    actions_failed: AtomicU64,
    checks_created: AtomicU64,
    checks_updated: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rules_evaluated: AtomicU64::new(0),
            actions_executed: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
            checks_created: AtomicU64::new(0),
            checks_updated: AtomicU64::new(0),
        }
    }

    pub fn inc_rules_evaluated(&self) {
        self.rules_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rules_evaluated", "counter incremented");
    }

    pub fn inc_actions_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "actions_executed", "counter incremented");
    }

    /// Actions that ended in `failure` or `error`.
    pub fn inc_actions_failed(&self) {
        self.actions_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "actions_failed", "counter incremented");
    }

    pub fn inc_checks_created(&self) {
        self.checks_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_created", "counter incremented");
    }

    pub fn inc_checks_updated(&self) {
        self.checks_updated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_updated", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            rules_evaluated = self.rules_evaluated(),
            actions_executed = self.actions_executed(),
            actions_failed = self.actions_failed(),
            checks_created = self.checks_created(),
            checks_updated = self.checks_updated(),
        );
    }

    pub fn rules_evaluated(&self) -> u64 {
        self.rules_evaluated.load(Ordering::Relaxed)
    }

    pub fn actions_executed(&self) -> u64 {
        self.actions_executed.load(Ordering::Relaxed)
    }

    pub fn actions_failed(&self) -> u64 {
        self.actions_failed.load(Ordering::Relaxed)
    }

    pub fn checks_created(&self) -> u64 {
        self.checks_created.load(Ordering::Relaxed)
    }

    pub fn checks_updated(&self) -> u64 {
        self.checks_updated.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.rules_evaluated.store(0, Ordering::Relaxed);
        self.actions_executed.store(0, Ordering::Relaxed);
        self.actions_failed.store(0, Ordering::Relaxed);
        self.checks_created.store(0, Ordering::Relaxed);
        self.checks_updated.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_rules_evaluated();
        m.inc_rules_evaluated();
        assert_eq!(m.rules_evaluated(), 2);

        m.inc_actions_executed();
        m.inc_actions_failed();
        assert_eq!(m.actions_executed(), 1);
        assert_eq!(m.actions_failed(), 1);

        m.inc_checks_created();
        m.inc_checks_updated();
        m.inc_checks_updated();
        assert_eq!(m.checks_created(), 1);
        assert_eq!(m.checks_updated(), 2);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_rules_evaluated();
        m.inc_actions_failed();
        m.inc_checks_created();
        m.reset();
        assert_eq!(m.rules_evaluated(), 0);
        assert_eq!(m.actions_failed(), 0);
        assert_eq!(m.checks_created(), 0);
    }
}
