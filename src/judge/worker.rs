//! Job worker task.
//!
//! Consumes decoded jobs in arrival order, judges them one at a time and
//! queues each verdict on the connection outbox. The outbox outlives any
//! single dispatcher socket, so a verdict finished while disconnected is
//! delivered after the next reconnect.

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Backend, Orchestrator};
use crate::protocol::{SubmissionJob, Verdict};

const LOG_TARGET: &str = "vjudger::worker";

/// Spawn the worker loop for one judger.
///
/// The task ends when the job channel closes (connection manager gone) or
/// the outbox is closed.
pub fn spawn_worker<B>(
    orchestrator: Orchestrator<B>,
    jobs: mpsc::UnboundedReceiver<SubmissionJob>,
    outbox: mpsc::Sender<Verdict>,
) -> JoinHandle<()>
where
    B: Backend + 'static,
{
    tokio::spawn(worker_loop(orchestrator, jobs, outbox))
}

async fn worker_loop<B: Backend>(
    mut orchestrator: Orchestrator<B>,
    mut jobs: mpsc::UnboundedReceiver<SubmissionJob>,
    outbox: mpsc::Sender<Verdict>,
) {
    while let Some(job) = jobs.recv().await {
        let run = orchestrator.judge(&job).await;
        info!(
            target: LOG_TARGET,
            "[{}] run {} judged: {}",
            orchestrator.backend().identity(),
            job.runid,
            run.verdict.result
        );

        if outbox.send(run.verdict).await.is_err() {
            warn!(
                target: LOG_TARGET,
                "[{}] outbox closed, dropping verdict for run {}",
                orchestrator.backend().identity(),
                job.runid
            );
            return;
        }
    }

    debug!(
        target: LOG_TARGET,
        "[{}] job channel closed, worker exiting",
        orchestrator.backend().identity()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{
        BackendError, BackendResult, JudgerIdentity, RemoteVerdict, RetryPolicy, Session,
    };
    use crate::protocol::RunId;
    use std::time::Duration;

    /// Accepts everything except language "9".
    struct EchoBackend {
        identity: JudgerIdentity,
    }

    impl Backend for EchoBackend {
        type State = Option<String>;

        fn identity(&self) -> &JudgerIdentity {
            &self.identity
        }

        fn translate_language(&self, code: &str) -> BackendResult<String> {
            if code == "9" {
                Err(BackendError::UnsupportedLanguage(code.to_string()))
            } else {
                Ok(code.to_string())
            }
        }

        async fn authenticate(&self, _session: &mut Session<Option<String>>) -> BackendResult<()> {
            Ok(())
        }

        async fn submit(
            &self,
            session: &mut Session<Option<String>>,
            job: &SubmissionJob,
            _language: &str,
        ) -> BackendResult<()> {
            session.state = Some(format!("remote-{}", job.runid));
            Ok(())
        }

        async fn poll_verdict(
            &self,
            session: &mut Session<Option<String>>,
        ) -> BackendResult<RemoteVerdict> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(RemoteVerdict {
                memory_used: "1".to_string(),
                time_used: "2".to_string(),
                result: "Accepted".to_string(),
                remote_runid: session.state.clone().unwrap_or_default(),
            })
        }

        async fn fetch_compile_diagnostics(
            &self,
            _session: &mut Session<Option<String>>,
        ) -> BackendResult<String> {
            Ok(String::new())
        }
    }

    fn job(runid: &str, language: &str) -> SubmissionJob {
        SubmissionJob {
            runid: RunId::new(runid),
            vid: "1000".to_string(),
            language: language.to_string(),
            source: String::new(),
        }
    }

    fn orchestrator() -> Orchestrator<EchoBackend> {
        Orchestrator::new(
            EchoBackend {
                identity: JudgerIdentity::new("echo", "tester"),
            },
            RetryPolicy {
                poll_timeout: Duration::from_secs(5),
                submit_backoff: Duration::ZERO,
                request_timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn worker_emits_one_verdict_per_job_in_order() {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (outbox_tx, mut outbox_rx) = mpsc::channel(8);
        let handle = spawn_worker(orchestrator(), jobs_rx, outbox_tx);

        jobs_tx.send(job("1", "0")).unwrap();
        jobs_tx.send(job("2", "9")).unwrap();
        jobs_tx.send(job("3", "0")).unwrap();
        drop(jobs_tx);

        let mut verdicts = Vec::new();
        while let Some(verdict) = outbox_rx.recv().await {
            verdicts.push(verdict);
        }
        handle.await.unwrap();

        let runids: Vec<String> = verdicts.iter().map(|v| v.runid.to_string()).collect();
        assert_eq!(runids, vec!["1", "2", "3"]);
        assert_eq!(verdicts[0].remote_runid, "remote-1");
        assert_eq!(verdicts[1].result, "Judge Error (Invalid Language)");
        assert_eq!(verdicts[2].remote_runid, "remote-3");
    }

    #[tokio::test]
    async fn worker_stops_when_outbox_closes() {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::channel(1);
        drop(outbox_rx);
        let handle = spawn_worker(orchestrator(), jobs_rx, outbox_tx);

        jobs_tx.send(job("1", "0")).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit")
            .unwrap();
    }
}
