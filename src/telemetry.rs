use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "workshop_operator=info,kube=info";

/// Controller-wide counters. Per-module requeues show which operator a
/// Workshop keeps waiting on
#[derive(Debug, Default)]
pub struct Metrics {
    pub reconcile_count: AtomicU64,
    pub reconcile_errors: AtomicU64,
    pub requeues: AtomicU64,
    pub module_deletions: AtomicU64,
    module_waits: Mutex<BTreeMap<&'static str, u64>>,
}

impl Metrics {
    pub fn record_reconcile(&self) {
        self.reconcile_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.reconcile_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A reconciliation ended early because `module` was waiting on something
    pub fn record_requeue(&self, module: &'static str) {
        self.requeues.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut waits) = self.module_waits.lock() {
            *waits.entry(module).or_insert(0) += 1;
        }
    }

    pub fn record_deletion(&self) {
        self.module_deletions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn module_waits(&self, module: &str) -> u64 {
        self.module_waits
            .lock()
            .map(|waits| waits.get(module).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

/// `RUST_LOG` when set and valid, our crate and kube at info otherwise
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(not(debug_assertions))]
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .init();
}

#[cfg(debug_assertions)]
pub fn init() {
    tracing_subscriber::fmt()
        .pretty()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(env_filter())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeues_are_counted_per_module() {
        let metrics = Metrics::default();
        metrics.record_requeue("gitops");
        metrics.record_requeue("gitops");
        metrics.record_requeue("codeready");

        assert_eq!(metrics.requeues.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.module_waits("gitops"), 2);
        assert_eq!(metrics.module_waits("vault"), 0);
    }
}
