//! Batch Scheduler - single-owner debounce actor
//!
//! Coalesces bursts of admitted items into one classification call:
//! - Idle: the first item opens a window with `deadline = now + base_window`
//! - Open: every further item is appended and moves the deadline by `extend_by`
//! - Deadline: the buffer is moved out, the window closes, the batch is handed
//!   to the flush channel and the scheduler is Idle again
//!
//! Enqueues and timer fires are serialized through one task, so an item that
//! races a deadline is either already in the flushed batch or opens the next
//! window. The flush channel is unbounded: handing a batch off never waits on
//! the classifier.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::window::{Window, WindowConfig};
use crate::types::{Batch, Item};

// ============================================================================
// Errors
// ============================================================================

/// Returned by [`SchedulerHandle::enqueue`] once the scheduler task is gone.
#[derive(Debug, thiserror::Error)]
#[error("Batch scheduler stopped, item {source_id}#{sequence_id} not accepted")]
pub struct SchedulerClosed {
    pub source_id: String,
    pub sequence_id: i64,
}

// ============================================================================
// Scheduler Handle
// ============================================================================

/// Handle to enqueue items into the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Item>,
}

impl SchedulerHandle {
    /// Enqueue an admitted item.
    ///
    /// Returns once the item is in the scheduler's inbox; the window is armed
    /// or extended when the scheduler task picks it up.
    pub async fn enqueue(&self, item: Item) -> Result<(), SchedulerClosed> {
        self.tx.send(item).await.map_err(|e| SchedulerClosed {
            source_id: e.0.source_id,
            sequence_id: e.0.sequence_id,
        })
    }
}

// ============================================================================
// Scheduler Stats
// ============================================================================

/// Counters reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub items_received: u64,
    pub batches_flushed: u64,
    pub largest_batch: usize,
    pub items_discarded: usize,
}

impl std::fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scheduler: {} items, {} batches (largest {}), {} discarded on shutdown",
            self.items_received, self.batches_flushed, self.largest_batch, self.items_discarded
        )
    }
}

// ============================================================================
// Scheduler Actor
// ============================================================================

/// Debounce actor owning the buffer and the single deadline.
pub struct BatchScheduler {
    config: WindowConfig,
    rx: mpsc::Receiver<Item>,
    flush_tx: mpsc::UnboundedSender<Batch>,
    cancel_token: CancellationToken,
    buffer: Vec<Item>,
    window: Option<Window>,
    stats: SchedulerStats,
}

impl BatchScheduler {
    /// Create the scheduler, its enqueue handle and the receiving end of the
    /// flush channel.
    pub fn new(
        config: WindowConfig,
        channel_buffer_size: usize,
        cancel_token: CancellationToken,
    ) -> (Self, SchedulerHandle, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::channel(channel_buffer_size.max(1));
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            config,
            rx,
            flush_tx,
            cancel_token,
            buffer: Vec::new(),
            window: None,
            stats: SchedulerStats::default(),
        };

        (scheduler, SchedulerHandle { tx }, flush_rx)
    }

    /// Run until cancelled or until every handle is dropped.
    ///
    /// When the handles go away an open window is flushed immediately. On
    /// cancellation the pending buffer is discarded.
    pub async fn run(mut self) -> SchedulerStats {
        info!(
            base_window_ms = duration_ms(self.config.base_window),
            extend_by_ms = duration_ms(self.config.extend_by),
            max_window_ms = self.config.max_window.map(duration_ms),
            "[BatchScheduler] Starting"
        );

        loop {
            let deadline = self.window.map(|w| w.deadline);

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    self.disarm_on_shutdown();
                    break;
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush("deadline");
                }
                received = self.rx.recv() => {
                    if let Some(item) = received {
                        self.accept(item);
                    } else {
                        if self.window.is_some() {
                            self.flush("drain");
                        }
                        info!("[BatchScheduler] All handles dropped, stopping");
                        break;
                    }
                }
            }
        }

        info!("[BatchScheduler] {}", self.stats);
        self.stats
    }

    fn accept(&mut self, item: Item) {
        self.stats.items_received += 1;
        let now = Instant::now();

        match self.window.as_mut() {
            None => {
                let window = Window::open(now, &self.config);
                debug!(
                    source = %item.source_id,
                    sequence_id = item.sequence_id,
                    flush_in_ms = duration_ms(window.deadline - now),
                    "[BatchScheduler] Window opened"
                );
                self.window = Some(window);
            }
            Some(window) => {
                window.extend(&self.config);
                debug!(
                    source = %item.source_id,
                    sequence_id = item.sequence_id,
                    buffered = self.buffer.len() + 1,
                    flush_in_ms = duration_ms(window.deadline.saturating_duration_since(now)),
                    capped = window.is_capped(&self.config),
                    "[BatchScheduler] Window extended"
                );
            }
        }

        self.buffer.push(item);
    }

    fn flush(&mut self, reason: &'static str) {
        let window = self.window.take();
        let batch = std::mem::take(&mut self.buffer);
        if batch.is_empty() {
            return;
        }

        self.stats.batches_flushed += 1;
        self.stats.largest_batch = self.stats.largest_batch.max(batch.len());

        info!(
            reason,
            items = batch.len(),
            window_ms = window.map(|w| duration_ms(w.deadline - w.opened_at)),
            extensions = window.map(|w| w.extensions),
            "[BatchScheduler] Flushing batch"
        );

        if self.flush_tx.send(batch).is_err() {
            warn!("[BatchScheduler] Flush receiver dropped, batch lost");
        }
    }

    fn disarm_on_shutdown(&mut self) {
        self.window = None;
        let pending = std::mem::take(&mut self.buffer);
        self.stats.items_discarded = pending.len();
        if pending.is_empty() {
            info!("[BatchScheduler] Shutdown signal received");
        } else {
            warn!(
                discarded = pending.len(),
                "[BatchScheduler] Shutdown with open window, pending items discarded"
            );
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(seq: i64) -> Item {
        Item::new("src", seq, format!("msg {seq}"), vec![])
    }

    fn window(base: u64, extend: u64) -> WindowConfig {
        WindowConfig {
            base_window: Duration::from_secs(base),
            extend_by: Duration::from_secs(extend),
            max_window: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_item_flushes_at_base_window() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(30, 3), 8, cancel.clone());
        let task = tokio::spawn(scheduler.run());

        let start = Instant::now();
        handle.enqueue(item(1)).await.unwrap();

        let batch = flush_rx.recv().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(batch.len(), 1);
        assert!(elapsed >= Duration::from_secs(30), "flushed early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(30_050), "flushed late: {elapsed:?}");

        cancel.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.batches_flushed, 1);
        assert_eq!(stats.items_discarded, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_items_five_seconds_apart_flush_at_33s() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(30, 3), 8, cancel.clone());
        tokio::spawn(scheduler.run());

        let start = Instant::now();
        handle.enqueue(item(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.enqueue(item(2)).await.unwrap();

        let batch = flush_rx.recv().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(batch.iter().map(|i| i.sequence_id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(elapsed >= Duration::from_secs(33), "flushed early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(33_050), "flushed late: {elapsed:?}");
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_n_items_extends_by_n_minus_one() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(10, 2), 64, cancel.clone());
        tokio::spawn(scheduler.run());

        let start = Instant::now();
        for seq in 1..=5 {
            handle.enqueue(item(seq)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let batch = flush_rx.recv().await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(batch.len(), 5);
        // base 10s + 4 x 2s
        assert!(elapsed >= Duration::from_secs(18));
        assert!(elapsed < Duration::from_millis(18_050));
        assert!(flush_rx.try_recv().is_err(), "burst must produce one batch");
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_after_flush_opens_new_window() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(10, 2), 8, cancel.clone());
        tokio::spawn(scheduler.run());

        handle.enqueue(item(1)).await.unwrap();
        let first = flush_rx.recv().await.unwrap();

        let reopened = Instant::now();
        handle.enqueue(item(2)).await.unwrap();
        let second = flush_rx.recv().await.unwrap();

        assert_eq!(first[0].sequence_id, 1);
        assert_eq!(second[0].sequence_id, 2);
        assert!(reopened.elapsed() >= Duration::from_secs(10));
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_discards_open_window() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(30, 3), 8, cancel.clone());
        let task = tokio::spawn(scheduler.run());

        handle.enqueue(item(1)).await.unwrap();
        handle.enqueue(item(2)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let stats = task.await.unwrap();
        assert_eq!(stats.items_discarded, 2);
        assert_eq!(stats.batches_flushed, 0);
        assert!(flush_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_flushes_pending_window() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, mut flush_rx) = BatchScheduler::new(window(30, 3), 8, cancel);
        let task = tokio::spawn(scheduler.run());

        handle.enqueue(item(1)).await.unwrap();
        drop(handle);

        let batch = flush_rx.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        let stats = task.await.unwrap();
        assert_eq!(stats.batches_flushed, 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_reports_closed() {
        let cancel = CancellationToken::new();
        let (scheduler, handle, _flush_rx) = BatchScheduler::new(window(1, 1), 1, cancel.clone());
        let task = tokio::spawn(scheduler.run());
        cancel.cancel();
        task.await.unwrap();

        let err = handle.enqueue(item(9)).await.unwrap_err();
        assert_eq!(err.sequence_id, 9);
    }
}
