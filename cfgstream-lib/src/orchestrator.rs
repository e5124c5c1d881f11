//! Drives the sequence of stream sessions.
//!
//! The [`Orchestrator`] runs as a single Tokio task and is the sole owner of
//! the active [`Session`]. It reacts to three inputs:
//!
//! - [`SessionEvent`]s from the active session (config blocks, rejects, errors)
//! - [`Command`]s from the [`StreamHandle`](crate::StreamHandle)
//! - the shutdown flag, a `watch` channel flipped by `close()`
//!
//! ```text
//!            poll() = Some            session ends
//!   Idle ─────────────────> Streaming ─────────────> Idle
//!    │  poll() = None                                 ^
//!    └──────────────> Waiting ── exhausted wait ──────┘
//!
//!   any state ── shutdown ──> Terminal
//! ```
//!
//! A new session is only opened after the previous session's task has
//! terminated, so config blocks from two sessions can never interleave.
//! Events that are still queued from an earlier session are recognized by
//! their [`SessionId`] and dropped.

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

use crate::session::{Session, SessionEvent, SessionEventKind, SessionId, StreamEndpoint};
use crate::types::Result;
use crate::{ConfigSink, ErrorKind, HostAddr, HostRotation};

/// Default delay before polling again when every node is burned, 1 second.
pub const DEFAULT_EXHAUSTED_WAIT: Duration = Duration::from_secs(1);

/// Capacity of the session event queue.
/// A full queue pauses reading from the network.
const EVENT_BUFFER: usize = 32;

/// Requests from the stream handle to the orchestrator
#[derive(Debug)]
pub(crate) enum Command {
    /// Abort the active session and move on to the next node
    ForceRefresh(oneshot::Sender<Result<()>>),
}

impl Command {
    pub(crate) fn force_refresh() -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::ForceRefresh(tx), rx)
    }
}

pub(crate) struct Orchestrator {
    endpoint: Arc<StreamEndpoint>,
    rotation: Arc<HostRotation>,
    sink: Box<dyn ConfigSink>,
    exhausted_wait: Duration,
    commands: mpsc::Receiver<Command>,
    shutdown: watch::Receiver<bool>,
    events_tx: mpsc::Sender<SessionEvent>,
    events: mpsc::Receiver<SessionEvent>,
    next_session: SessionId,
}

impl Orchestrator {
    pub(crate) fn new(
        endpoint: Arc<StreamEndpoint>,
        rotation: Arc<HostRotation>,
        sink: Box<dyn ConfigSink>,
        exhausted_wait: Duration,
        commands: mpsc::Receiver<Command>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        Self {
            endpoint,
            rotation,
            sink,
            exhausted_wait,
            commands,
            shutdown,
            events_tx,
            events,
            next_session: SessionId::first(),
        }
    }

    /// Run until shutdown is requested or the stream handle is dropped.
    pub(crate) async fn run(mut self) {
        log::debug!(
            "Config stream started (bucket={}, tls={}, nodes={})",
            self.endpoint.bucket,
            self.endpoint.tls,
            self.rotation.len()
        );

        while !self.is_shutdown() {
            let flow = match self.rotation.poll() {
                Some(host) => self.stream_from(host).await,
                None => {
                    log::info!("Node list exhausted, waiting");
                    self.wait().await
                }
            };
            if flow.is_break() {
                break;
            }
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Waiting state: sleep for the exhausted-list delay, unless shut down.
    async fn wait(&mut self) -> ControlFlow<()> {
        let deadline = tokio::time::sleep(self.exhausted_wait);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || self.is_shutdown() {
                        return ControlFlow::Break(());
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::ForceRefresh(reply)) => {
                        let _ = reply.send(Err(ErrorKind::NotStreaming));
                    }
                    None => return ControlFlow::Break(()),
                },
                () = &mut deadline => return ControlFlow::Continue(()),
            }
        }
    }

    /// Streaming state: run one session until it ends.
    async fn stream_from(&mut self, host: HostAddr) -> ControlFlow<()> {
        let id = self.next_session;
        self.next_session = id.next();

        let mut session = Session::open(
            id,
            host,
            Arc::clone(&self.endpoint),
            self.events_tx.clone(),
        );

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || self.is_shutdown() {
                        session.abort().await;
                        return ControlFlow::Break(());
                    }
                }
                Some(event) = self.events.recv() => {
                    if event.session != session.id() {
                        log::debug!("Ignoring event from replaced session {}", event.session);
                        continue;
                    }
                    if self.is_shutdown() {
                        session.abort().await;
                        return ControlFlow::Break(());
                    }
                    self.handle_event(event.kind, session.host());
                }
                command = self.commands.recv() => match command {
                    Some(Command::ForceRefresh(reply)) => {
                        let host = session.host().clone();
                        log::info!("Forcing refresh of config stream from {host}");
                        session.abort().await;
                        let _ = reply.send(Ok(()));
                        self.log_closed(&host);
                        return ControlFlow::Continue(());
                    }
                    None => {
                        session.abort().await;
                        return ControlFlow::Break(());
                    }
                },
                finished = &mut session.task => {
                    if self.is_shutdown() {
                        return ControlFlow::Break(());
                    }
                    if let Err(e) = finished
                        && e.is_panic()
                    {
                        log::error!("Config stream task for {} panicked", session.host());
                    }
                    self.log_closed(session.host());
                    return ControlFlow::Continue(());
                }
            }
        }
    }

    fn handle_event(&self, kind: SessionEventKind, host: &HostAddr) {
        match kind {
            SessionEventKind::Block(block) => self.deliver(&block, host),
            SessionEventKind::Rejected(status) => log::info!(
                "{} (host={host}, tls={}, bucket={})",
                ErrorKind::RejectedStatusCode(status),
                self.endpoint.tls,
                self.endpoint.bucket
            ),
            SessionEventKind::Failed(e) => log::warn!(
                "Config stream error (host={host}, bucket={}): {}",
                self.endpoint.bucket,
                e.details()
            ),
        }
    }

    /// Hand a block to the sink. Nothing the sink does can stop the stream.
    fn deliver(&self, block: &[u8], host: &HostAddr) {
        let block = match std::str::from_utf8(block) {
            Ok(block) => block,
            Err(e) => {
                log::warn!(
                    "Discarding config from {host}: {}",
                    ErrorKind::InvalidUtf8(e)
                );
                return;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| self.sink.handle_config(block, host))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to handle config from {host}: {e}"),
            Err(_) => log::error!("Config handler panicked on config from {host}"),
        }
    }

    fn log_closed(&self, host: &HostAddr) {
        log::info!(
            "Config stream closed (host={host}, bucket={})",
            self.endpoint.bucket
        );
    }
}
