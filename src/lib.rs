//! SirenWatch: channel chatter watcher
//!
//! Polls monitored message channels, debounces bursts into batches, asks an
//! AI classifier whether the situation changed, and relays the verdict.
//!
//! ## Architecture
//!
//! - **Cursor**: per-source watermark, admits each message once
//! - **Batch Scheduler**: adaptive debounce window (single-owner actor)
//! - **Classifier**: provider-agnostic client with bounded history and retries
//! - **Relay**: verdict to notification decision and sinks
//! - **Pipeline**: poll loop and flush worker tying it together

pub mod batch;
pub mod classifier;
pub mod config;
pub mod cursor;
pub mod gate;
pub mod pipeline;
pub mod preamble;
pub mod relay;
pub mod source;
pub mod types;

// Re-export configuration
pub use config::WatchConfig;

// Re-export commonly used types
pub use types::{
    Attachment, Batch, ClassificationResult, ConversationEntry, Item, RelayAction, Role,
};

pub use batch::{BatchScheduler, SchedulerHandle, WindowConfig};
pub use classifier::{build_classifier, Classifier, ClassifierError};
pub use cursor::CursorTracker;
pub use pipeline::{FlushWorker, PipelineCoordinator, PipelineStats};
pub use preamble::Preamble;
pub use relay::{decide, RelaySink};
pub use source::{MessageSource, RawMessage};
