//! Polling-based preamble file watcher.
//!
//! Checks the file's mtime every poll interval. When a change is detected it
//! debounces (editors write in stages), re-reads the file and swaps it into
//! the shared [`Preamble`]. A failed read keeps the previous text.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use super::{read_preamble, Preamble};
use crate::config::defaults;

/// Timing for the watcher loop.
#[derive(Debug, Clone, Copy)]
pub struct WatcherTiming {
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl Default for WatcherTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(defaults::PREAMBLE_POLL_INTERVAL_MS),
            debounce: Duration::from_millis(defaults::PREAMBLE_DEBOUNCE_MS),
        }
    }
}

/// Run the preamble watcher until cancelled.
///
/// Returns the number of successful reloads.
pub async fn run_preamble_watcher(
    path: PathBuf,
    preamble: Arc<Preamble>,
    timing: WatcherTiming,
    cancel: CancellationToken,
) -> u64 {
    tracing::info!(path = %path.display(), "[PreambleWatcher] Started");

    let mut last_mtime = get_mtime(&path);
    let mut reloads = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(reloads, "[PreambleWatcher] Stopped");
                return reloads;
            }
            _ = tokio::time::sleep(timing.poll_interval) => {}
        }

        let current = match get_mtime(&path) {
            Some(t) => t,
            None => {
                if last_mtime.is_some() {
                    tracing::warn!(
                        path = %path.display(),
                        "[PreambleWatcher] File not accessible, keeping current preamble"
                    );
                    last_mtime = None;
                }
                continue;
            }
        };

        let changed = match last_mtime {
            Some(prev) => current != prev,
            None => true,
        };
        if !changed {
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => continue,
            _ = tokio::time::sleep(timing.debounce) => {}
        }

        // Still being written; pick it up on the next cycle.
        if get_mtime(&path) != Some(current) {
            continue;
        }
        last_mtime = Some(current);

        match read_preamble(&path) {
            Ok(text) => {
                preamble.update(text);
                reloads += 1;
                tracing::info!(
                    version = preamble.version(),
                    "[PreambleWatcher] Preamble reloaded"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "[PreambleWatcher] Reload failed, keeping previous preamble");
            }
        }
    }
}

fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
