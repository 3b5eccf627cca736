//! Pipeline statistics
//!
//! Counters shared by the coordinator and the flush worker. Plain atomics:
//! nobody reads them on a hot path, they are only summarized in logs.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub ticks: AtomicU64,
    pub ticks_suppressed: AtomicU64,
    pub gate_errors: AtomicU64,
    pub source_errors: AtomicU64,
    pub items_admitted: AtomicU64,
    pub items_duplicate: AtomicU64,
    pub batches_classified: AtomicU64,
    pub classifications_failed: AtomicU64,
    pub relays_sent: AtomicU64,
    pub relays_unchanged: AtomicU64,
    pub relays_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub ticks_suppressed: u64,
    pub gate_errors: u64,
    pub source_errors: u64,
    pub items_admitted: u64,
    pub items_duplicate: u64,
    pub batches_classified: u64,
    pub classifications_failed: u64,
    pub relays_sent: u64,
    pub relays_unchanged: u64,
    pub relays_failed: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: load(&self.ticks),
            ticks_suppressed: load(&self.ticks_suppressed),
            gate_errors: load(&self.gate_errors),
            source_errors: load(&self.source_errors),
            items_admitted: load(&self.items_admitted),
            items_duplicate: load(&self.items_duplicate),
            batches_classified: load(&self.batches_classified),
            classifications_failed: load(&self.classifications_failed),
            relays_sent: load(&self.relays_sent),
            relays_unchanged: load(&self.relays_unchanged),
            relays_failed: load(&self.relays_failed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} ticks ({} suppressed, {} gate errors), {} items admitted ({} duplicates, {} source errors), \
             {} batches classified ({} failed), relays: {} sent, {} unchanged, {} failed",
            self.ticks,
            self.ticks_suppressed,
            self.gate_errors,
            self.items_admitted,
            self.items_duplicate,
            self.source_errors,
            self.batches_classified,
            self.classifications_failed,
            self.relays_sent,
            self.relays_unchanged,
            self.relays_failed
        )
    }
}
