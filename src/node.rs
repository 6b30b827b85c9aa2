//! Node bootstrap: one judger per configured account.
//!
//! A judger is a connection manager task plus a job worker task joined by
//! two channels. Jobs flow socket -> worker on an unbounded channel;
//! verdicts flow worker -> socket on the bounded outbox, which outlives
//! individual dispatcher connections.

use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backends::HduBackend;
use crate::config::{BackendKind, DispatcherSettings, Settings};
use crate::dispatcher::{ConnectionManager, ConnectionState, OUTBOX_CAPACITY};
use crate::judge::{Backend, JudgerIdentity, Orchestrator, RetryPolicy, spawn_worker};

const LOG_TARGET: &str = "vjudger::node";

/// Running judger tasks.
pub struct JudgerHandle {
    identity: JudgerIdentity,
    state: watch::Receiver<ConnectionState>,
    connection: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl JudgerHandle {
    pub fn identity(&self) -> &JudgerIdentity {
        &self.identity
    }

    /// Watch the dispatcher connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait for both tasks to finish.
    ///
    /// The connection task ends on cancellation; dropping its job sender
    /// then lets the worker finish its current job and exit.
    pub async fn join(self) {
        if let Err(e) = self.connection.await {
            warn!(target: LOG_TARGET, "[{}] connection task failed: {}", self.identity, e);
        }
        if let Err(e) = self.worker.await {
            warn!(target: LOG_TARGET, "[{}] worker task failed: {}", self.identity, e);
        }
    }
}

/// Start the tasks of one judger.
pub fn spawn_judger<B>(
    backend: B,
    dispatcher: DispatcherSettings,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> JudgerHandle
where
    B: Backend + 'static,
{
    let identity = backend.identity().clone();
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

    let worker = spawn_worker(Orchestrator::new(backend, policy), jobs_rx, outbox_tx);
    let manager = ConnectionManager::new(identity.clone(), dispatcher, jobs_tx, outbox_rx);
    let state = manager.subscribe();
    let connection = tokio::spawn(manager.run(cancel));

    info!(target: LOG_TARGET, "[{}] judger started", identity);
    JudgerHandle {
        identity,
        state,
        connection,
        worker,
    }
}

/// Start one judger per account in `settings`.
pub fn start(settings: &Settings, cancel: &CancellationToken) -> Vec<JudgerHandle> {
    let policy = RetryPolicy::from(&settings.judge);
    settings
        .accounts
        .iter()
        .map(|account| match account.backend {
            BackendKind::Hdu => spawn_judger(
                HduBackend::new(account, &settings.judge),
                settings.dispatcher.clone(),
                policy,
                cancel.child_token(),
            ),
        })
        .collect()
}

/// Run all judgers until `cancel` fires and every task has stopped.
pub async fn run(settings: Settings, cancel: CancellationToken) {
    let handles = start(&settings, &cancel);
    info!(
        target: LOG_TARGET,
        "node running {} judger(s) against {}",
        handles.len(),
        settings.dispatcher.address()
    );
    for handle in handles {
        handle.join().await;
    }
    info!(target: LOG_TARGET, "node stopped");
}
