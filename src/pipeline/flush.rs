//! Flush worker - classify a batch and relay the verdict
//!
//! Consumes batches from the scheduler's flush channel one at a time, so at
//! most one classification is in flight. Failures are logged and counted;
//! a batch is never re-queued.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::state::PipelineStats;
use crate::classifier::{Classifier, ClassifierError};
use crate::relay::{decide, RelayError, RelaySink};
use crate::types::{Batch, ConversationEntry};

/// What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Relayed,
    /// Verdict reported no status change
    Unchanged,
    RelayFailed,
    ClassificationFailed,
    Cancelled,
}

pub struct FlushWorker {
    classifier: Arc<dyn Classifier>,
    relay: Arc<dyn RelaySink>,
    channel: String,
    stats: Arc<PipelineStats>,
    cancel_token: CancellationToken,
}

impl FlushWorker {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        relay: Arc<dyn RelaySink>,
        channel: impl Into<String>,
        stats: Arc<PipelineStats>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            classifier,
            relay,
            channel: channel.into(),
            stats,
            cancel_token,
        }
    }

    /// Drain the flush channel until it closes or the token is cancelled.
    ///
    /// Returns the number of batches handled.
    pub async fn run(self, mut batches: mpsc::UnboundedReceiver<Batch>) -> u64 {
        info!(
            provider = self.classifier.provider_name(),
            relay = self.relay.name(),
            channel = %self.channel,
            "[FlushWorker] Started"
        );
        let mut handled = 0u64;

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!(handled, "[FlushWorker] Shutdown signal received");
                    break;
                }
                b = batches.recv() => match b {
                    Some(b) => b,
                    None => {
                        info!(handled, "[FlushWorker] Flush channel closed");
                        break;
                    }
                },
            };

            self.handle_batch(batch).await;
            handled += 1;
        }
        handled
    }

    /// Classify one batch and relay the verdict if it warrants a post.
    pub async fn handle_batch(&self, batch: Batch) -> FlushOutcome {
        let size = batch.len();
        let entry = ConversationEntry::from_batch(&batch);

        let result = match self.classifier.send(entry).await {
            Ok(r) => r,
            Err(ClassifierError::Cancelled) => {
                info!(size, "[FlushWorker] Classification cancelled");
                return FlushOutcome::Cancelled;
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.classifications_failed);
                error!(size, error = %e, "[FlushWorker] Classification failed, batch dropped");
                return FlushOutcome::ClassificationFailed;
            }
        };
        PipelineStats::bump(&self.stats.batches_classified);

        let Some(action) = decide(&result) else {
            PipelineStats::bump(&self.stats.relays_unchanged);
            info!(size, danger = result.danger, "[FlushWorker] Status unchanged, nothing to relay");
            return FlushOutcome::Unchanged;
        };

        let posted = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(RelayError::Cancelled),
            r = self.relay.post(&self.channel, &action.body, action.silent) => r,
        };

        match posted {
            Err(RelayError::Cancelled) => {
                info!(size, body = %action.body, "[FlushWorker] Relay cancelled");
                FlushOutcome::Cancelled
            }
            Ok(()) => {
                PipelineStats::bump(&self.stats.relays_sent);
                info!(
                    size,
                    danger = result.danger,
                    silent = action.silent,
                    "[FlushWorker] Verdict relayed"
                );
                FlushOutcome::Relayed
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.relays_failed);
                warn!(error = %e, body = %action.body, "[FlushWorker] Relay failed");
                FlushOutcome::RelayFailed
            }
        }
    }
}
