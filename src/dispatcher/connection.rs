//! Connection manager for one judger's dispatcher link.
//!
//! # Write serialization
//!
//! The socket has two producers: the secret at connect time and verdict
//! frames. Both are written from the single `serve` loop, so a frame is
//! always written whole before the next write starts.
//!
//! # Disconnect while judging
//!
//! Verdicts travel through an outbox channel that the manager keeps across
//! reconnects. A verdict produced while disconnected waits in the channel; a
//! verdict whose write failed is parked in `unsent` and goes out first on the
//! next connection.

use std::collections::VecDeque;
use std::io;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::ConnectionState;
use crate::config::DispatcherSettings;
use crate::error::{JudgerError, JudgerResult};
use crate::judge::{JudgerIdentity, reporter};
use crate::protocol::{FrameDecoder, MAX_FRAME_LEN, ProtocolError, SubmissionJob, Verdict, encode};

const LOG_TARGET: &str = "vjudger::dispatcher";

/// Capacity of the verdict outbox between worker and connection.
pub const OUTBOX_CAPACITY: usize = 64;

/// Size of the socket read buffer.
pub const JOB_READ_BUFFER_LEN: usize = 8 * 1024;

/// Appended to compile info that was cut to fit one frame. Contains no
/// characters JSON would escape.
const TRUNCATED_NOTE: &str = " ... (truncated)";

/// Outcome of a write that did not fail.
#[derive(Debug, PartialEq, Eq)]
enum Written {
    Done,
    Cancelled,
}

/// How a connected session ended without an error.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The dispatcher closed the socket.
    Closed,
    /// Cancellation was requested or the worker side went away.
    Shutdown,
}

pub struct ConnectionManager {
    identity: JudgerIdentity,
    settings: DispatcherSettings,
    jobs: mpsc::UnboundedSender<SubmissionJob>,
    outbox: mpsc::Receiver<Verdict>,
    unsent: VecDeque<Verdict>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    /// Create a manager that forwards decoded jobs to `jobs` and writes
    /// verdicts received on `outbox`.
    pub fn new(
        identity: JudgerIdentity,
        settings: DispatcherSettings,
        jobs: mpsc::UnboundedSender<SubmissionJob>,
        outbox: mpsc::Receiver<Verdict>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            identity,
            settings,
            jobs,
            outbox,
            unsent: VecDeque::new(),
            state_tx,
        }
    }

    /// Watch connection state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connect, serve, and reconnect until `cancel` fires.
    ///
    /// Reconnection is unconditional: a fixed delay, no growth, no cap.
    pub async fn run(mut self, cancel: CancellationToken) {
        let address = self.settings.address();
        let delay = self.settings.reconnect_delay();

        loop {
            self.set_state(ConnectionState::Connecting);
            info!(
                target: LOG_TARGET,
                "[{}] connecting to dispatcher at {}",
                self.identity,
                address
            );

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = TcpStream::connect(address.as_str()) => result,
            };

            match connected {
                Ok(stream) => {
                    self.set_state(ConnectionState::Connected);
                    match self.serve(stream, &cancel).await {
                        Ok(SessionEnd::Shutdown) => break,
                        Ok(SessionEnd::Closed) => {
                            info!(
                                target: LOG_TARGET,
                                "[{}] dispatcher closed the connection",
                                self.identity
                            );
                        }
                        Err(e @ JudgerError::WorkerStopped { .. }) => {
                            error!(target: LOG_TARGET, "[{}] {}", self.identity, e);
                            break;
                        }
                        Err(e) => {
                            warn!(
                                target: LOG_TARGET,
                                "[{}] connection lost: {}",
                                self.identity,
                                e
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "[{}] failed to connect to {}: {}",
                        self.identity,
                        address,
                        e
                    );
                }
            }

            self.set_state(ConnectionState::Disconnected);
            info!(
                target: LOG_TARGET,
                "[{}] reconnecting in {:?}",
                self.identity,
                delay
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!(target: LOG_TARGET, "[{}] connection manager stopped", self.identity);
    }

    /// Serve one connected socket until it closes, fails, or shutdown.
    async fn serve<S>(&mut self, stream: S, cancel: &CancellationToken) -> JudgerResult<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        // One-way authentication: no reply is expected.
        let secret = self.settings.secret.as_bytes();
        if let Written::Cancelled = self.write_bounded(&mut writer, secret, cancel).await? {
            return Ok(SessionEnd::Shutdown);
        }
        self.set_state(ConnectionState::Authenticated);
        info!(target: LOG_TARGET, "[{}] connected and authenticated", self.identity);

        while let Some(verdict) = self.unsent.pop_front() {
            if let Written::Cancelled = self.deliver(&mut writer, verdict, cancel).await? {
                return Ok(SessionEnd::Shutdown);
            }
        }

        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; JOB_READ_BUFFER_LEN];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(SessionEnd::Shutdown),

                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(SessionEnd::Closed);
                    }
                    decoder.feed(&buf[..n]);
                    while let Some(job) = decoder.next_frame::<SubmissionJob>()? {
                        debug!(
                            target: LOG_TARGET,
                            "[{}] received run {} (vid={})",
                            self.identity,
                            job.runid,
                            job.vid
                        );
                        self.jobs
                            .send(job)
                            .map_err(|_| JudgerError::worker_stopped(self.identity.as_str()))?;
                    }
                }

                verdict = self.outbox.recv() => match verdict {
                    Some(verdict) => {
                        if let Written::Cancelled = self.deliver(&mut writer, verdict, cancel).await? {
                            return Ok(SessionEnd::Shutdown);
                        }
                    }
                    None => return Ok(SessionEnd::Shutdown),
                },
            }
        }
    }

    /// Write one verdict frame. A verdict that was not fully written is
    /// parked for the next connection.
    async fn deliver<W>(
        &mut self,
        writer: &mut W,
        verdict: Verdict,
        cancel: &CancellationToken,
    ) -> JudgerResult<Written>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(frame) = self.encode_verdict(&verdict) else {
            return Ok(Written::Done);
        };

        match self.write_bounded(writer, &frame, cancel).await {
            Ok(Written::Done) => {
                info!(
                    target: LOG_TARGET,
                    "[{}] sent verdict for run {}: {}",
                    self.identity,
                    verdict.runid,
                    verdict.result
                );
                Ok(Written::Done)
            }
            Ok(Written::Cancelled) => {
                debug!(
                    target: LOG_TARGET,
                    "[{}] shutdown before verdict for run {} was sent",
                    self.identity,
                    verdict.runid
                );
                self.unsent.push_front(verdict);
                Ok(Written::Cancelled)
            }
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "[{}] verdict for run {} not sent, requeued: {}",
                    self.identity,
                    verdict.runid,
                    e
                );
                self.unsent.push_front(verdict);
                Err(e.into())
            }
        }
    }

    /// Frame a verdict for the wire.
    ///
    /// An oversized verdict gets its `compile_info` cut down to fit. If it
    /// still cannot be framed, a plain judge error for the same run is sent
    /// in its place, so the run is never left without a verdict.
    fn encode_verdict(&self, verdict: &Verdict) -> Option<Vec<u8>> {
        let error = match encode(verdict) {
            Ok(frame) => return Some(frame),
            Err(error) => error,
        };

        if let ProtocolError::FrameTooLarge(len) = error {
            let trimmed = truncate_compile_info(verdict, len - MAX_FRAME_LEN);
            if let Some(frame) = trimmed.and_then(|trimmed| encode(&trimmed).ok()) {
                warn!(
                    target: LOG_TARGET,
                    "[{}] compile info of run {} truncated to fit one frame",
                    self.identity,
                    verdict.runid
                );
                return Some(frame);
            }
        }

        warn!(
            target: LOG_TARGET,
            "[{}] verdict for run {} cannot be framed ({}), reporting judge error instead",
            self.identity,
            verdict.runid,
            error
        );
        match encode(&reporter::judge_error(&verdict.runid)) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!(
                    target: LOG_TARGET,
                    "[{}] dropping verdict for run {}: {}",
                    self.identity,
                    verdict.runid,
                    e
                );
                None
            }
        }
    }

    /// Write and flush `bytes`, giving up on shutdown or when the dispatcher
    /// stops reading for longer than the write timeout.
    async fn write_bounded<W>(
        &self,
        writer: &mut W,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> io::Result<Written>
    where
        W: AsyncWrite + Unpin,
    {
        let limit = self.settings.write_timeout();
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };

        tokio::select! {
            _ = cancel.cancelled() => Ok(Written::Cancelled),
            result = tokio::time::timeout(limit, write) => match result {
                Ok(written) => written.map(|()| Written::Done),
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("dispatcher stopped reading for {:?}", limit),
                )),
            },
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(
                target: LOG_TARGET,
                "[{}] {} -> {}",
                self.identity,
                previous,
                state
            );
        }
    }
}

/// Shorten `compile_info` so the encoded verdict shrinks by at least
/// `excess` bytes. `None` when there is not enough diagnostics text to cut.
fn truncate_compile_info(verdict: &Verdict, excess: usize) -> Option<Verdict> {
    let info = &verdict.compile_info;
    let mut keep = info.len().checked_sub(excess + TRUNCATED_NOTE.len())?;
    while !info.is_char_boundary(keep) {
        keep -= 1;
    }

    let mut trimmed = verdict.clone();
    trimmed.compile_info.truncate(keep);
    trimmed.compile_info.push_str(TRUNCATED_NOTE);
    Some(trimmed)
}
