//! Error handling types for vjudger
//!
//! Backend failures never surface here: the judging pipeline turns them into
//! verdicts. These are the faults of the node itself (configuration, the
//! dispatcher connection, internal channels).

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::ProtocolError;

/// Crate-level error type
#[derive(Debug, Error)]
pub enum JudgerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Framing or payload error on the dispatcher connection
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket error on the dispatcher connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The job worker is no longer accepting jobs
    #[error("job worker for {identity} stopped")]
    WorkerStopped { identity: String },
}

/// Result type for node-level operations
pub type JudgerResult<T> = Result<T, JudgerError>;

impl JudgerError {
    pub fn worker_stopped(identity: impl Into<String>) -> Self {
        JudgerError::WorkerStopped {
            identity: identity.into(),
        }
    }
}
