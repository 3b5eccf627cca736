//! Per-source cursor tracking.
//!
//! The cursor is the only deduplication mechanism: an item is admitted iff its
//! sequence id is strictly greater than the highest one admitted so far for the
//! same source. Content is never compared.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;

/// Watermark assumed for a source that has never been seen.
pub const DEFAULT_WATERMARK: i64 = 0;

/// Highest admitted sequence id per source.
///
/// Shared by handle (`Arc<CursorTracker>`) between every poll task. Each
/// admission is a single short critical section, so concurrent admissions for
/// the same source can never move the watermark backwards.
#[derive(Debug, Default)]
pub struct CursorTracker {
    watermarks: Mutex<HashMap<String, i64>>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `sequence_id` for `source_id`.
    ///
    /// Returns `true` and raises the watermark when the id is new, `false`
    /// (no state change) otherwise.
    pub fn admit(&self, source_id: &str, sequence_id: i64) -> bool {
        let mut watermarks = self.watermarks.lock().unwrap_or_else(|e| {
            tracing::warn!("Cursor mutex poisoned, recovering");
            e.into_inner()
        });

        let current = watermarks
            .get(source_id)
            .copied()
            .unwrap_or(DEFAULT_WATERMARK);

        if sequence_id <= current {
            trace!(source = source_id, sequence_id, watermark = current, "Rejected seen item");
            return false;
        }

        watermarks.insert(source_id.to_string(), sequence_id);
        true
    }

    /// Current watermark for a source.
    pub fn watermark(&self, source_id: &str) -> i64 {
        let watermarks = self.watermarks.lock().unwrap_or_else(|e| e.into_inner());
        watermarks
            .get(source_id)
            .copied()
            .unwrap_or(DEFAULT_WATERMARK)
    }

    /// Copy of every known watermark, sorted by source for stable logging.
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        let watermarks = self.watermarks.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = watermarks
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unseen_source_admits_positive_ids() {
        let tracker = CursorTracker::new();
        assert!(tracker.admit("X", 1));
        assert_eq!(tracker.watermark("X"), 1);
        assert_eq!(tracker.watermark("never-seen"), DEFAULT_WATERMARK);
    }

    #[test]
    fn test_equal_id_rejected_next_id_accepted() {
        let tracker = CursorTracker::new();
        assert!(tracker.admit("X", 42));

        assert!(!tracker.admit("X", 42));
        assert_eq!(tracker.watermark("X"), 42);

        assert!(tracker.admit("X", 43));
        assert_eq!(tracker.watermark("X"), 43);
    }

    #[test]
    fn test_older_id_never_regresses_watermark() {
        let tracker = CursorTracker::new();
        assert!(tracker.admit("X", 100));
        assert!(!tracker.admit("X", 7));
        assert_eq!(tracker.watermark("X"), 100);
    }

    #[test]
    fn test_sources_are_independent() {
        let tracker = CursorTracker::new();
        assert!(tracker.admit("a", 5));
        assert!(tracker.admit("b", 1));
        assert!(!tracker.admit("a", 5));
        assert_eq!(tracker.snapshot(), vec![("a".to_string(), 5), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_watermark_is_max_of_admitted_sequence() {
        let tracker = CursorTracker::new();
        let ids = [3, 1, 9, 9, 4, 12, 11, 12, 13];
        let mut max_seen = DEFAULT_WATERMARK;
        for id in ids {
            let accepted = tracker.admit("s", id);
            assert_eq!(accepted, id > max_seen, "id {id} vs watermark {max_seen}");
            max_seen = max_seen.max(id);
            assert_eq!(tracker.watermark("s"), max_seen);
        }
    }

    #[test]
    fn test_concurrent_admission_admits_each_id_once() {
        let tracker = Arc::new(CursorTracker::new());
        let mut handles = Vec::new();

        // Every thread replays the same id range; each id may win only once
        // and only while it is above the watermark.
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                let mut accepted = Vec::new();
                for id in 1..=500 {
                    if tracker.admit("shared", id) {
                        accepted.push(id);
                    }
                }
                accepted
            }));
        }

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let before = all.len();
        all.dedup();

        assert_eq!(before, all.len(), "an id was admitted twice");
        assert_eq!(tracker.watermark("shared"), 500);
    }
}
