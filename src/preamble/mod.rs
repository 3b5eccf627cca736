//! Classifier preamble (system instruction text)
//!
//! The current text lives behind an `ArcSwap` so the classifier reads it
//! lock-free on every dispatch while [`watcher`] swaps in edits from disk.
//! Replacing the preamble never touches conversation history.

pub mod watcher;

use arc_swap::ArcSwap;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

pub use watcher::run_preamble_watcher;

#[derive(Debug, thiserror::Error)]
pub enum PreambleError {
    #[error("Failed to read preamble {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Preamble file {0} is empty")]
    Empty(PathBuf),
}

/// Shared, hot-swappable preamble text.
pub struct Preamble {
    text: ArcSwap<String>,
    version: watch::Sender<u64>,
}

impl Preamble {
    pub fn new(text: impl Into<String>) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            text: ArcSwap::from_pointee(text.into()),
            version,
        }
    }

    /// Read the preamble from disk. An empty file is an error.
    pub fn load_from_file(path: &Path) -> Result<Self, PreambleError> {
        Ok(Self::new(read_preamble(path)?))
    }

    /// Current preamble text.
    pub fn current(&self) -> Arc<String> {
        self.text.load_full()
    }

    /// Replace the preamble and notify subscribers.
    pub fn update(&self, text: String) {
        self.text.store(Arc::new(text));
        self.version.send_modify(|v| *v += 1);
    }

    /// Receiver that changes whenever the preamble is replaced.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Number of replacements since construction.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Preamble stamped with the local wall-clock time, as sent to providers.
    pub fn render(&self, now: DateTime<Local>) -> String {
        format!("{}\nCurrent time: {}", self.current(), now.format("%H:%M:%S"))
    }
}

pub(crate) fn read_preamble(path: &Path) -> Result<String, PreambleError> {
    let text = std::fs::read_to_string(path).map_err(|source| PreambleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(PreambleError::Empty(path.to_path_buf()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    #[test]
    fn test_render_appends_wall_clock() {
        let preamble = Preamble::new("Classify the chatter.");
        let now = Local.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
        assert_eq!(
            preamble.render(now),
            "Classify the chatter.\nCurrent time: 07:05:09"
        );
    }

    #[test]
    fn test_update_bumps_version() {
        let preamble = Preamble::new("v1");
        let rx = preamble.subscribe();
        preamble.update("v2".to_string());

        assert_eq!(preamble.current().as_str(), "v2");
        assert_eq!(preamble.version(), 1);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Be terse.").unwrap();

        let preamble = Preamble::load_from_file(file.path()).unwrap();
        assert_eq!(preamble.current().as_str(), "Be terse.");
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Preamble::load_from_file(file.path()).err().unwrap();
        assert!(matches!(err, PreambleError::Empty(_)));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = Preamble::load_from_file(Path::new("/nonexistent/system_message.txt"))
            .err()
            .unwrap();
        assert!(matches!(err, PreambleError::Read { .. }));
    }
}
