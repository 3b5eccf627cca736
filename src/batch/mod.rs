//! Adaptive batching of admitted items.
//!
//! See [`scheduler`] for the debounce state machine and [`window`] for the
//! deadline arithmetic.

pub mod scheduler;
pub mod window;

pub use scheduler::{BatchScheduler, SchedulerClosed, SchedulerHandle, SchedulerStats};
pub use window::{Window, WindowConfig};
