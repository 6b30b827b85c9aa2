//! Judging engine: the backend contract and the pipeline that drives it.
//!
//! # Components
//!
//! - `Backend`: capability contract every remote judge implements
//! - `Orchestrator`: per-job state machine with the submit retry cascade
//! - `reporter`: turns pipeline outcomes into wire verdicts
//! - `spawn_worker`: background task feeding jobs through one orchestrator
//! - `PollSchedule`: suspend-then-check pacing for verdict polling

pub mod backend;
pub mod pipeline;
pub mod poll;
pub mod reporter;
mod worker;

pub use backend::{
    Backend, BackendError, BackendResult, COMPILE_ERROR, JudgerIdentity, RemoteVerdict, Session,
};
pub use pipeline::{FailureReason, JudgeRun, Orchestrator, PipelineStage, RetryPolicy, SubmitTier};
pub use poll::PollSchedule;
pub use worker::spawn_worker;
