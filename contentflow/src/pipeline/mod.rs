//! Pipeline execution.
//!
//! This module provides:
//! - The four stages and the per-record state machine ([`Orchestrator`])
//! - The pre-publish QA gate and failure logging
//! - Whole-pipeline retry ([`CompositeRunner`]) and batch sweeps ([`BatchDriver`])

mod batch;
mod composite;
mod failure;
mod gate;
mod inflight;
mod orchestrator;
mod retry;
mod stage;


pub use batch::{BatchDriver, BatchReport};
pub use composite::{CompositeOutcome, CompositeRunner};
pub use failure::FailureRecorder;
pub use gate::QaGate;
pub use inflight::{InFlightGuard, InFlightRegistry};
pub use orchestrator::Orchestrator;
pub use retry::{RetryDecision, RetryPolicy};
pub use stage::{PipelineRun, Stage, StageOutcome, StageReport};
