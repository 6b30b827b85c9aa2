//! Capability contract for remote grading backends.
//!
//! The orchestrator depends only on [`Backend`]. A new remote judge is added
//! by implementing the trait; nothing in the pipeline changes.
//!
//! Session state is explicit: each backend declares its private state type
//! and the orchestrator owns a [`Session`] wrapping it, passing it by
//! `&mut` into every call. The backend value itself only holds immutable
//! configuration (credentials, URLs, timing).

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::SubmissionJob;

/// Result text a backend reports for a compilation failure.
pub const COMPILE_ERROR: &str = "Compile Error";

/// Diagnostic label of one judger: backend name plus account.
///
/// Used in logs only; it has no behavioural effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgerIdentity(String);

impl JudgerIdentity {
    pub fn new(backend: &str, account: &str) -> Self {
        Self(format!("{}:{}", backend, account))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JudgerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failures reported by backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The dispatcher language code has no mapping on this backend.
    #[error("unsupported language code: {0}")]
    UnsupportedLanguage(String),

    /// Credentials were rejected or the session is not logged in.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The backend refused an identical resubmission.
    #[error("backend rejected duplicate submission")]
    SameCode,

    /// No terminal verdict within the polling bound.
    #[error("no verdict within {0:?}")]
    Timeout(Duration),

    /// The backend answered but refused the request.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the backend.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend's response could not be understood.
    #[error("unexpected backend response: {0}")]
    Parse(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Terminal verdict as reported by the remote judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVerdict {
    pub memory_used: String,
    pub time_used: String,
    pub result: String,
    pub remote_runid: String,
}

impl RemoteVerdict {
    pub fn is_compile_error(&self) -> bool {
        self.result == COMPILE_ERROR
    }
}

/// Per-backend-instance session: authentication flag plus the backend's
/// private state (cookie jar, last submission locator, ...).
#[derive(Debug, Default)]
pub struct Session<S> {
    authenticated: bool,
    pub state: S,
}

impl<S> Session<S> {
    pub fn new(state: S) -> Self {
        Self {
            authenticated: false,
            state,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Assume the remote session expired; the next job logs in again.
    pub fn invalidate(&mut self) {
        self.authenticated = false;
    }
}

/// Operations a remote grading backend must provide.
///
/// All network operations are async and must suspend rather than block;
/// `poll_verdict` in particular must wait between checks (see
/// [`PollSchedule`](super::PollSchedule)).
pub trait Backend: Send + Sync {
    /// Backend-private session state.
    type State: Default + Send;

    fn identity(&self) -> &JudgerIdentity;

    /// Map a dispatcher language code to the backend's own id. Pure, no I/O.
    fn translate_language(&self, code: &str) -> BackendResult<String>;

    /// Establish a fresh session. Safe to call again when the session is
    /// assumed stale.
    fn authenticate(
        &self,
        session: &mut Session<Self::State>,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Send `job.source` for `job.vid` under the translated `language`,
    /// recording whatever the backend needs to poll for the verdict later.
    fn submit(
        &self,
        session: &mut Session<Self::State>,
        job: &SubmissionJob,
        language: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    /// Wait for the terminal verdict of the last submission.
    fn poll_verdict(
        &self,
        session: &mut Session<Self::State>,
    ) -> impl Future<Output = BackendResult<RemoteVerdict>> + Send;

    /// Fetch compiler output for the last submission. Only called when the
    /// verdict is [`COMPILE_ERROR`].
    fn fetch_compile_diagnostics(
        &self,
        session: &mut Session<Self::State>,
    ) -> impl Future<Output = BackendResult<String>> + Send;
}
