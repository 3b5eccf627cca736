//! Watch Pipeline
//!
//! ```text
//! Coordinator (interval tick)
//!   gate -> sources (concurrent) -> cursor -> BatchScheduler
//!                                               | flush channel
//!                                               v
//!                               FlushWorker: classifier -> decide -> relay
//! ```
//!
//! Coordinator, scheduler and flush worker are separate tasks sharing one
//! `CancellationToken`.

mod coordinator;
mod flush;
mod state;

pub use coordinator::{GatePolicy, PipelineCoordinator, TickOutcome};
pub use flush::{FlushOutcome, FlushWorker};
pub use state::{PipelineStats, StatsSnapshot};
