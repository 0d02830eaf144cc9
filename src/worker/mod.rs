//! The transcode worker: queue poller, job runner and scratch cleanup.

pub mod poller;
pub mod runner;
pub mod scratch;

pub use poller::{CycleOutcome, QueuePoller};
pub use runner::{JobOutcome, JobRunner, RunnerSettings};
pub use scratch::ScratchGuard;
