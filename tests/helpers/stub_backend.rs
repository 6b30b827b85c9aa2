//! A scripted backend: verdicts keyed by problem id, no network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use vjudger::judge::{
    Backend, BackendError, BackendResult, JudgerIdentity, RemoteVerdict, Session,
};
use vjudger::protocol::SubmissionJob;

#[derive(Debug, Default)]
pub struct StubState {
    vid: Option<String>,
}

#[derive(Clone, Default)]
pub struct Counters {
    pub logins: Arc<AtomicUsize>,
    pub submits: Arc<AtomicUsize>,
}

impl Counters {
    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

pub struct StubBackend {
    identity: JudgerIdentity,
    verdicts: HashMap<String, RemoteVerdict>,
    /// When set, each poll waits for one permit.
    gate: Option<Arc<Semaphore>>,
    counters: Counters,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            identity: JudgerIdentity::new("stub", "tester"),
            verdicts: HashMap::new(),
            gate: None,
            counters: Counters::default(),
        }
    }

    pub fn with_verdict(mut self, vid: &str, memory: &str, time: &str, result: &str, remote: &str) -> Self {
        self.verdicts.insert(
            vid.to_string(),
            RemoteVerdict {
                memory_used: memory.to_string(),
                time_used: time.to_string(),
                result: result.to_string(),
                remote_runid: remote.to_string(),
            },
        );
        self
    }

    /// Hold every poll until the returned semaphore gets a permit.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

impl Backend for StubBackend {
    type State = StubState;

    fn identity(&self) -> &JudgerIdentity {
        &self.identity
    }

    fn translate_language(&self, code: &str) -> BackendResult<String> {
        match code {
            "0" | "1" | "2" => Ok(code.to_string()),
            other => Err(BackendError::UnsupportedLanguage(other.to_string())),
        }
    }

    async fn authenticate(&self, _session: &mut Session<StubState>) -> BackendResult<()> {
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn submit(
        &self,
        session: &mut Session<StubState>,
        job: &SubmissionJob,
        _language: &str,
    ) -> BackendResult<()> {
        self.counters.submits.fetch_add(1, Ordering::SeqCst);
        if !self.verdicts.contains_key(&job.vid) {
            return Err(BackendError::Rejected(format!("no such problem {}", job.vid)));
        }
        session.state.vid = Some(job.vid.clone());
        Ok(())
    }

    async fn poll_verdict(&self, session: &mut Session<StubState>) -> BackendResult<RemoteVerdict> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| BackendError::Http("gate closed".to_string()))?
                .forget();
        }
        session
            .state
            .vid
            .as_ref()
            .and_then(|vid| self.verdicts.get(vid))
            .cloned()
            .ok_or_else(|| BackendError::Parse("nothing submitted".to_string()))
    }

    async fn fetch_compile_diagnostics(
        &self,
        _session: &mut Session<StubState>,
    ) -> BackendResult<String> {
        Ok("main.c:1: error: expected ';'".to_string())
    }
}
