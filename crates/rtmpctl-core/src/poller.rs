// ── Status poller ──
//
// One background task per poll session. The task asks the device for its
// streaming token, hands the outcome to a callback, sleeps, and repeats
// until cancelled. Cancellation is checked before each request, raced
// against the request and the sleep, and checked again before a result is
// delivered, so a cancelled session never reports anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use rtmpctl_api::{DeviceAddress, TransportError};

use crate::error::ProtocolError;
use crate::model::{DesiredState, ObservedState};
use crate::transport::DeviceTransport;

pub type SessionId = u64;

/// Whether a session polls once or until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// A single request, used for the startup probe.
    Once,
    Continuous,
}

/// A poll that did not yield a recognized state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl PollError {
    /// Every failed poll collapses to the same observable state.
    pub fn observed(&self) -> ObservedState {
        ObservedState::Unreachable
    }
}

pub type PollOutcome = Result<ObservedState, PollError>;

// ── Instrumentation ──────────────────────────────────────────────

/// Live counters over every session a poller has launched.
#[derive(Debug, Default)]
pub struct SessionCounters {
    started: AtomicU64,
    terminated: AtomicU64,
    active: AtomicU64,
    peak_active: AtomicU64,
}

/// Copy of [`SessionCounters`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub started: u64,
    pub terminated: u64,
    pub active: u64,
    pub peak_active: u64,
}

impl SessionCounters {
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            started: self.started.load(Ordering::SeqCst),
            terminated: self.terminated.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
        }
    }
}

/// Marks one session as running for as long as it is held.
struct ActiveSession {
    counters: Arc<SessionCounters>,
}

impl ActiveSession {
    fn enter(counters: Arc<SessionCounters>) -> Self {
        counters.started.fetch_add(1, Ordering::SeqCst);
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_active.fetch_max(active, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

// ── PollSession ──────────────────────────────────────────────────

/// Handle to one running poll loop.
///
/// Dropping the handle cancels the loop; [`await_termination`] additionally
/// waits for it to exit.
///
/// [`await_termination`]: PollSession::await_termination
#[derive(Debug)]
pub struct PollSession {
    id: SessionId,
    desired: DesiredState,
    mode: PollMode,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
    handle: JoinHandle<()>,
}

impl PollSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The desired state in effect when the session was launched.
    pub fn desired(&self) -> DesiredState {
        self.desired
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    /// Request the loop to stop. Honored within one interval.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the loop has fully exited.
    ///
    /// Does not cancel by itself: a `Once` session runs to completion, a
    /// `Continuous` one must be cancelled first or this never returns.
    pub async fn await_termination(self) {
        let Self {
            id,
            handle,
            cancel_on_drop,
            ..
        } = self;
        if let Err(e) = handle.await {
            if e.is_panic() {
                warn!(session = id, "poll session panicked");
            }
        }
        drop(cancel_on_drop);
    }
}

// ── StatusPoller ─────────────────────────────────────────────────

/// Launches poll sessions against one transport.
pub struct StatusPoller<T> {
    transport: Arc<T>,
    interval: Duration,
    next_id: AtomicU64,
    counters: Arc<SessionCounters>,
}

impl<T: DeviceTransport> StatusPoller<T> {
    pub fn new(transport: Arc<T>, interval: Duration) -> Self {
        Self {
            transport,
            interval,
            next_id: AtomicU64::new(0),
            counters: Arc::new(SessionCounters::default()),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    /// Single status request outside any session.
    pub async fn probe_once(&self, address: &DeviceAddress) -> PollOutcome {
        fetch(self.transport.as_ref(), address).await
    }

    /// Spawn a poll loop. Must be called from within a Tokio runtime.
    ///
    /// `on_result` runs on the poll task and receives the session id with
    /// each outcome; it should hand the outcome off rather than block.
    pub fn start<F>(
        &self,
        address: DeviceAddress,
        desired: DesiredState,
        mode: PollMode,
        on_result: F,
    ) -> PollSession
    where
        F: Fn(SessionId, PollOutcome) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let active = ActiveSession::enter(Arc::clone(&self.counters));

        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.transport),
            address,
            self.interval,
            mode,
            cancel.clone(),
            id,
            on_result,
            active,
        ));
        debug!(session = id, %address, ?mode, "poll session started");

        PollSession {
            id,
            desired,
            mode,
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop<T, F>(
    transport: Arc<T>,
    address: DeviceAddress,
    interval: Duration,
    mode: PollMode,
    cancel: CancellationToken,
    id: SessionId,
    on_result: F,
    _active: ActiveSession,
) where
    T: DeviceTransport,
    F: Fn(SessionId, PollOutcome) + Send + 'static,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = fetch(transport.as_ref(), &address) => outcome,
        };

        if cancel.is_cancelled() {
            trace!(session = id, "discarding result fetched after cancellation");
            break;
        }
        on_result(id, outcome);

        if mode == PollMode::Once {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!(session = id, "poll session terminated");
}

async fn fetch<T: DeviceTransport>(transport: &T, address: &DeviceAddress) -> PollOutcome {
    let resp = transport.get_observed_state(address).await?;
    Ok(ObservedState::from_token(resp.token())?)
}
