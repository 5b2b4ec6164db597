//! Parallel execution of the align and segment phases.
//!
//! Each phase runs on its own bounded pool of OS threads, connected by
//! crossbeam channels so the segment phase starts on the first alignment
//! that finishes.

pub mod pool;
pub mod scheduler;

pub use pool::{Accumulator, Unordered, WorkerPool};
pub use scheduler::{
    ManifestAccumulator, OrderBy, PipelineScheduler, RecordingOutcome, RunSummary,
    SchedulerOptions, order_pairs, stt_parallelism,
};
