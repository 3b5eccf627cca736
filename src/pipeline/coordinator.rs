//! Pipeline Coordinator - fixed-interval poll loop
//!
//! ```text
//! tick -> gate -> poll every source concurrently -> oldest-first
//!      -> cursor.admit -> scheduler.enqueue
//! ```
//!
//! A suppressed tick touches neither cursors nor the open batch window. A
//! failing source is skipped for the tick; the others still run.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::PipelineStats;
use crate::batch::{SchedulerClosed, SchedulerHandle};
use crate::config::{GateConfig, SourcesConfig, SuppressWhen};
use crate::cursor::CursorTracker;
use crate::gate::{suppresses, AlertGate};
use crate::source::{normalize_oldest_first, MessageSource};
use crate::types::Item;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Gate suppressed the tick or failed
    Suppressed,
    /// Sources were polled; `admitted` items went to the scheduler
    Polled { admitted: usize },
    /// Cancelled mid-tick
    Cancelled,
}

/// Gate settings the coordinator applies per tick.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    pub suppress_when: SuppressWhen,
    pub bypass_first_tick: bool,
}

impl From<&GateConfig> for GatePolicy {
    fn from(config: &GateConfig) -> Self {
        Self {
            suppress_when: config.suppress_when,
            bypass_first_tick: config.bypass_first_tick,
        }
    }
}

pub struct PipelineCoordinator {
    channels: Vec<String>,
    message_limit: usize,
    poll_interval: Duration,
    source: Arc<dyn MessageSource>,
    gate: Arc<dyn AlertGate>,
    gate_policy: GatePolicy,
    cursor: Arc<CursorTracker>,
    scheduler: SchedulerHandle,
    stats: Arc<PipelineStats>,
    cancel_token: CancellationToken,
}

impl PipelineCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: &SourcesConfig,
        source: Arc<dyn MessageSource>,
        gate: Arc<dyn AlertGate>,
        gate_policy: GatePolicy,
        cursor: Arc<CursorTracker>,
        scheduler: SchedulerHandle,
        stats: Arc<PipelineStats>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            channels: sources.channels.clone(),
            message_limit: sources.message_limit,
            poll_interval: sources.poll_interval(),
            source,
            gate,
            gate_policy,
            cursor,
            scheduler,
            stats,
            cancel_token,
        }
    }

    /// Poll until cancelled. Returns the number of ticks run.
    ///
    /// Errors only when the scheduler is gone, which means the pipeline can
    /// no longer make progress.
    pub async fn run(self) -> Result<u64, SchedulerClosed> {
        info!(
            sources = self.channels.len(),
            interval_secs = self.poll_interval.as_secs(),
            via = self.source.source_name(),
            "[Coordinator] Polling started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!(ticks, "[Coordinator] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let outcome = self.tick(ticks == 0).await?;
            ticks += 1;
            if outcome == TickOutcome::Cancelled {
                info!(ticks, "[Coordinator] Cancelled mid-tick");
                break;
            }
        }

        let watermarks = self.cursor.snapshot();
        debug!(?watermarks, "[Coordinator] Final watermarks");
        Ok(ticks)
    }

    /// Run one poll tick.
    pub async fn tick(&self, first: bool) -> Result<TickOutcome, SchedulerClosed> {
        PipelineStats::bump(&self.stats.ticks);

        if !(first && self.gate_policy.bypass_first_tick) {
            let state = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Ok(TickOutcome::Cancelled),
                s = self.gate.is_active() => s,
            };
            match state {
                Ok(active) if suppresses(self.gate_policy.suppress_when, active) => {
                    PipelineStats::bump(&self.stats.ticks_suppressed);
                    debug!(active, "[Coordinator] Tick suppressed by gate");
                    return Ok(TickOutcome::Suppressed);
                }
                Ok(_) => {}
                Err(e) => {
                    PipelineStats::bump(&self.stats.gate_errors);
                    warn!(error = %e, "[Coordinator] Gate check failed, skipping tick");
                    return Ok(TickOutcome::Suppressed);
                }
            }
        }

        let polls = join_all(self.channels.iter().map(|id| {
            let source = &self.source;
            let limit = self.message_limit;
            async move { (id, source.poll(id, limit).await) }
        }));
        let results = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => return Ok(TickOutcome::Cancelled),
            r = polls => r,
        };

        let mut admitted = 0usize;
        for (source_id, result) in results {
            let messages = match result {
                Ok(m) => m,
                Err(e) => {
                    PipelineStats::bump(&self.stats.source_errors);
                    warn!(source = %source_id, error = %e, "[Coordinator] Source poll failed");
                    continue;
                }
            };

            for message in normalize_oldest_first(messages) {
                if !self.cursor.admit(source_id, message.sequence_id) {
                    PipelineStats::bump(&self.stats.items_duplicate);
                    continue;
                }
                debug!(
                    source = %source_id,
                    sequence_id = message.sequence_id,
                    "[Coordinator] Item admitted"
                );
                let item = Item::new(
                    source_id.as_str(),
                    message.sequence_id,
                    message.text,
                    message.attachments,
                );
                self.scheduler.enqueue(item).await?;
                PipelineStats::bump(&self.stats.items_admitted);
                admitted += 1;
            }
        }

        if admitted > 0 {
            info!(admitted, "[Coordinator] New items queued for batching");
        }
        Ok(TickOutcome::Polled { admitted })
    }
}
