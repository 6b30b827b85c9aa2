//! Judging pipeline: drives one backend through one submission.
//!
//! # Stages
//!
//! ```text
//! Received ─► LanguageMapped ─► [Authenticated] ─► Submitting(tier) ─► Submitted(tier)
//!     ─► Polling ─► VerdictReady ─► [CompileInfo] ─► Reported
//! ```
//!
//! Any stage may end in `Failed(reason)`. Both ends produce exactly one
//! verdict.
//!
//! # Submit retry cascade
//!
//! Remote sessions expire silently and rate limiting looks the same as
//! being logged out, so a failed submit is retried in three tiers:
//!
//! 1. `Direct`: plain submit.
//! 2. `Relogin`: authenticate again, then submit. A failed login here is
//!    final (`LoginFailed`).
//! 3. `Backoff`: wait `submit_backoff`, then submit one last time.
//!
//! A `SameCode` rejection is definitive and stops the cascade at once.
//!
//! # Time bounds
//!
//! Every backend call is wrapped in `tokio::time::timeout`: polling by
//! `poll_timeout`, everything else by `request_timeout`. An expired call
//! fails like any other backend error, so `judge` always returns.

use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};

use super::reporter;
use super::{Backend, BackendError, RemoteVerdict, Session};
use crate::config::JudgeSettings;
use crate::protocol::{SubmissionJob, Verdict};

const LOG_TARGET: &str = "vjudger::pipeline";

/// Timing knobs of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Hard bound on one `poll_verdict` call.
    pub poll_timeout: Duration,
    /// Delay before the tier-3 submit attempt.
    pub submit_backoff: Duration,
    /// Bound on each `authenticate`, `submit` and
    /// `fetch_compile_diagnostics` call.
    pub request_timeout: Duration,
}

impl From<&JudgeSettings> for RetryPolicy {
    fn from(settings: &JudgeSettings) -> Self {
        Self {
            poll_timeout: settings.poll_timeout(),
            submit_backoff: settings.submit_backoff(),
            request_timeout: settings.request_timeout(),
        }
    }
}

/// Tier of the submit retry cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTier {
    Direct,
    Relogin,
    Backoff,
}

const SUBMIT_TIERS: [SubmitTier; 3] = [SubmitTier::Direct, SubmitTier::Relogin, SubmitTier::Backoff];

/// Why a job ended without a backend verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No backend mapping for the job's language code. No I/O was done.
    InvalidLanguage,
    /// Authentication failed, initially or during the cascade.
    LoginFailed(BackendError),
    /// The backend refused a duplicate submission.
    SameCode,
    /// Submit cascade exhausted or polling failed.
    Backend(BackendError),
}

impl From<BackendError> for FailureReason {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::SameCode => FailureReason::SameCode,
            other => FailureReason::Backend(other),
        }
    }
}

/// Stages a job passes through, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    LanguageMapped,
    Authenticated,
    Submitting(SubmitTier),
    Submitted(SubmitTier),
    Polling,
    VerdictReady,
    CompileInfo,
    Reported,
    Failed(FailureReason),
}

/// Outcome of judging one job.
#[derive(Debug, Clone)]
pub struct JudgeRun {
    pub verdict: Verdict,
    pub stages: Vec<PipelineStage>,
}

impl JudgeRun {
    /// Tier at which the submission went through, if it did.
    pub fn submit_tier(&self) -> Option<SubmitTier> {
        self.stages.iter().find_map(|stage| match stage {
            PipelineStage::Submitted(tier) => Some(*tier),
            _ => None,
        })
    }

    /// Number of submit attempts made.
    pub fn submit_attempts(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| matches!(stage, PipelineStage::Submitting(_)))
            .count()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.stages.iter().find_map(|stage| match stage {
            PipelineStage::Failed(reason) => Some(reason),
            _ => None,
        })
    }
}

/// Backend verdict plus diagnostics, before it is shaped for the wire.
struct Judged {
    remote: RemoteVerdict,
    compile_info: String,
}

/// Runs jobs through one backend session, one job at a time.
///
/// Owns the backend's [`Session`]; `judge` takes `&mut self`, so two jobs
/// can never touch the session concurrently.
pub struct Orchestrator<B: Backend> {
    backend: B,
    session: Session<B::State>,
    policy: RetryPolicy,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self {
            backend,
            session: Session::default(),
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &Session<B::State> {
        &self.session
    }

    /// Judge one job. Always yields exactly one verdict.
    pub async fn judge(&mut self, job: &SubmissionJob) -> JudgeRun {
        let mut stages = vec![PipelineStage::Received];
        debug!(
            target: LOG_TARGET,
            "[{}] run {} received (vid={}, language={})",
            self.backend.identity(),
            job.runid,
            job.vid,
            job.language
        );

        let verdict = match self.drive(job, &mut stages).await {
            Ok(judged) => {
                stages.push(PipelineStage::Reported);
                reporter::judged(job, judged.remote, judged.compile_info)
            }
            Err(reason) => {
                warn!(
                    target: LOG_TARGET,
                    "[{}] run {} failed: {:?}",
                    self.backend.identity(),
                    job.runid,
                    reason
                );
                let verdict = reporter::failed(job, &reason);
                stages.push(PipelineStage::Failed(reason));
                verdict
            }
        };

        JudgeRun { verdict, stages }
    }

    async fn drive(
        &mut self,
        job: &SubmissionJob,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<Judged, FailureReason> {
        let language = self
            .backend
            .translate_language(&job.language)
            .map_err(|_| FailureReason::InvalidLanguage)?;
        self.advance(job, stages, PipelineStage::LanguageMapped);

        if !self.session.is_authenticated() {
            self.login(job, stages).await?;
        }

        self.submit_with_retry(job, &language, stages).await?;

        self.advance(job, stages, PipelineStage::Polling);
        let remote = self.poll().await?;
        self.advance(job, stages, PipelineStage::VerdictReady);

        let compile_info = if remote.is_compile_error() {
            self.advance(job, stages, PipelineStage::CompileInfo);
            let fetch = self.backend.fetch_compile_diagnostics(&mut self.session);
            match bounded(self.policy.request_timeout, fetch).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "[{}] run {}: compile info unavailable: {}",
                        self.backend.identity(),
                        job.runid,
                        e
                    );
                    String::new()
                }
            }
        } else {
            String::new()
        };

        Ok(Judged {
            remote,
            compile_info,
        })
    }

    async fn login(
        &mut self,
        job: &SubmissionJob,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<(), FailureReason> {
        let attempt = self.backend.authenticate(&mut self.session);
        match bounded(self.policy.request_timeout, attempt).await {
            Ok(()) => {
                self.session.mark_authenticated();
                self.advance(job, stages, PipelineStage::Authenticated);
                Ok(())
            }
            Err(e) => {
                self.session.invalidate();
                Err(FailureReason::LoginFailed(e))
            }
        }
    }

    async fn submit_with_retry(
        &mut self,
        job: &SubmissionJob,
        language: &str,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<SubmitTier, FailureReason> {
        let mut last_error = None;

        for tier in SUBMIT_TIERS {
            match tier {
                SubmitTier::Direct => {}
                SubmitTier::Relogin => {
                    info!(
                        target: LOG_TARGET,
                        "[{}] run {}: submit failed, logging in again",
                        self.backend.identity(),
                        job.runid
                    );
                    self.session.invalidate();
                    self.login(job, stages).await?;
                }
                SubmitTier::Backoff => {
                    info!(
                        target: LOG_TARGET,
                        "[{}] run {}: submit failed after relogin, retrying in {:?}",
                        self.backend.identity(),
                        job.runid,
                        self.policy.submit_backoff
                    );
                    tokio::time::sleep(self.policy.submit_backoff).await;
                }
            }

            self.advance(job, stages, PipelineStage::Submitting(tier));
            let attempt = self.backend.submit(&mut self.session, job, language);
            match bounded(self.policy.request_timeout, attempt).await {
                Ok(()) => {
                    self.advance(job, stages, PipelineStage::Submitted(tier));
                    return Ok(tier);
                }
                Err(BackendError::SameCode) => return Err(FailureReason::SameCode),
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "[{}] run {}: submit attempt ({:?}) failed: {}",
                        self.backend.identity(),
                        job.runid,
                        tier,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FailureReason::Backend(last_error.unwrap_or_else(|| {
            BackendError::Rejected("submit cascade exhausted".to_string())
        })))
    }

    async fn poll(&mut self) -> Result<RemoteVerdict, FailureReason> {
        let poll = self.backend.poll_verdict(&mut self.session);
        bounded(self.policy.poll_timeout, poll)
            .await
            .map_err(FailureReason::from)
    }

    fn advance(&self, job: &SubmissionJob, stages: &mut Vec<PipelineStage>, stage: PipelineStage) {
        debug!(
            target: LOG_TARGET,
            "[{}] run {} -> {:?}",
            self.backend.identity(),
            job.runid,
            stage
        );
        stages.push(stage);
    }
}

/// Run one backend call, failing with `Timeout(limit)` if it does not finish.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(BackendError::Timeout(limit)))
}
