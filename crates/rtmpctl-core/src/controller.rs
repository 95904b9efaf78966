// ── Stream controller ──
//
// The reconciling state machine. A `StreamController` handle forwards
// intents over a channel to one actor task, which owns every piece of
// mutable state: desired and observed streaming state, the device address,
// the lifecycle phase and the single live poll session. Command results and
// poll results re-enter through the same channel, tagged so that anything
// produced by a superseded command or session can be recognized and dropped.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, trace, warn};

use rtmpctl_api::{DeviceAddress, DeviceClient, RawResponse, TransportError};

use crate::config::{AddressRepository, ControllerConfig};
use crate::error::{CoreError, ValidationError};
use crate::model::{
    ChangeReason, ControllerEvent, ControllerSnapshot, DesiredState, ObservedState, Phase,
    StateChangeEvent,
};
use crate::poller::{
    PollMode, PollOutcome, PollSession, SessionCounters, SessionId, SessionStats, StatusPoller,
};
use crate::transport::DeviceTransport;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Messages ─────────────────────────────────────────────────────

#[derive(Debug)]
enum Intent {
    Start,
    Stop,
    SetAddress(DeviceAddress),
}

enum Message {
    Intent {
        intent: Intent,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    CommandDone {
        seq: u64,
        enabled: bool,
        result: Result<RawResponse, TransportError>,
    },
    PollResult {
        session: SessionId,
        outcome: PollOutcome,
    },
    Shutdown,
}

/// Which operation put the controller into [`Phase::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorOrigin {
    Probe,
    Command,
    Poll,
}

// ── StreamController ─────────────────────────────────────────────

/// Handle to a running controller.
///
/// Cheaply cloneable via `Arc`. The actor shuts down when the last handle is
/// dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct StreamController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    message_tx: mpsc::UnboundedSender<Message>,
    event_tx: broadcast::Sender<ControllerEvent>,
    state_rx: watch::Receiver<ControllerSnapshot>,
    counters: Arc<SessionCounters>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        let _ = self.message_tx.send(Message::Shutdown);
    }
}

impl StreamController {
    /// Build a controller that talks HTTP to the device.
    ///
    /// Loads the address from `repository` and, if one is known, launches
    /// the one-shot startup probe. Must be called within a Tokio runtime.
    pub fn new(
        config: ControllerConfig,
        repository: Arc<dyn AddressRepository>,
    ) -> Result<Self, CoreError> {
        let client = DeviceClient::new(&config.transport())?;
        Self::with_transport(client, repository, config)
    }

    /// Build a controller over any [`DeviceTransport`].
    pub fn with_transport<T: DeviceTransport>(
        transport: T,
        repository: Arc<dyn AddressRepository>,
        config: ControllerConfig,
    ) -> Result<Self, CoreError> {
        let address = repository
            .load()?
            .map(|address| address.with_port(config.device_port));
        let poller = StatusPoller::new(Arc::new(transport), config.poll_interval);
        let counters = poller.counters();

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (state_tx, state_rx) = watch::channel(ControllerSnapshot {
            address,
            ..ControllerSnapshot::default()
        });

        let mut engine = Engine {
            poller,
            repository,
            address,
            phase: Phase::Idle,
            desired: DesiredState::Stopped,
            observed: ObservedState::Unknown,
            session: None,
            probing: false,
            error_origin: None,
            last_error: None,
            command_seq: 0,
            inflight: None,
            message_tx: message_tx.clone(),
            event_tx: event_tx.clone(),
            state_tx,
        };
        match address {
            Some(address) => engine.start_probe(address),
            None => debug!("no device address configured, skipping startup probe"),
        }
        engine.publish();

        let task = tokio::spawn(engine.run(message_rx));

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                message_tx,
                event_tx,
                state_rx,
                counters,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    // ── Intents ──────────────────────────────────────────────────

    /// Ask the device to start streaming and begin monitoring it.
    ///
    /// Fails synchronously with [`ValidationError::AddressUnset`] when no
    /// address is configured. Network failures are reported as events.
    pub async fn request_start(&self) -> Result<(), CoreError> {
        self.send_intent(Intent::Start).await
    }

    /// Ask the device to stop streaming and retire the poll session.
    pub async fn request_stop(&self) -> Result<(), CoreError> {
        self.send_intent(Intent::Stop).await
    }

    /// Validate, persist and adopt a new device address.
    ///
    /// Malformed input is rejected here, before anything is saved or sent.
    pub async fn set_address(&self, input: &str) -> Result<DeviceAddress, CoreError> {
        let address = DeviceAddress::parse(input)?.with_port(self.inner.config.device_port);
        self.send_intent(Intent::SetAddress(address)).await?;
        Ok(address)
    }

    async fn send_intent(&self, intent: Intent) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .message_tx
            .send(Message::Intent { intent, reply })
            .map_err(|_| CoreError::ControllerStopped)?;
        rx.await.map_err(|_| CoreError::ControllerStopped)?
    }

    /// Stop the actor and wait for it, and its poll session, to exit.
    pub async fn shutdown(&self) {
        let _ = self.inner.message_tx.send(Message::Shutdown);
        let task = self.inner.task.lock().expect("task lock poisoned").take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "controller task did not exit cleanly");
            }
        }
    }

    // ── Observation ──────────────────────────────────────────────

    /// Raw event receiver. Each subscriber sees every event sent after it
    /// subscribed, unless it falls more than the channel capacity behind.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Event stream that skips over lag instead of failing.
    pub fn events(&self) -> impl Stream<Item = ControllerEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged");
                None
            }
        })
    }

    pub fn state(&self) -> watch::Receiver<ControllerSnapshot> {
        self.inner.state_rx.clone()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.inner.state_rx.borrow().clone()
    }

    pub fn session_counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.inner.counters)
    }

    pub fn session_stats(&self) -> SessionStats {
        self.inner.counters.stats()
    }

    /// Wait for the first snapshot matching `predicate`.
    pub async fn wait_until<F>(&self, predicate: F) -> Result<ControllerSnapshot, CoreError>
    where
        F: FnMut(&ControllerSnapshot) -> bool,
    {
        let mut rx = self.state();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| CoreError::ControllerStopped)?;
        Ok(snapshot.clone())
    }

    /// Wait until no probe or command is in flight.
    pub async fn settled(&self) -> Result<ControllerSnapshot, CoreError> {
        self.wait_until(ControllerSnapshot::controls_enabled).await
    }
}

// ── Engine (actor state) ─────────────────────────────────────────

struct Engine<T> {
    poller: StatusPoller<T>,
    repository: Arc<dyn AddressRepository>,
    address: Option<DeviceAddress>,
    phase: Phase,
    desired: DesiredState,
    observed: ObservedState,
    session: Option<PollSession>,
    probing: bool,
    error_origin: Option<ErrorOrigin>,
    last_error: Option<String>,
    command_seq: u64,
    /// Sequence number of the only command whose result still matters.
    inflight: Option<u64>,
    message_tx: mpsc::UnboundedSender<Message>,
    event_tx: broadcast::Sender<ControllerEvent>,
    state_tx: watch::Sender<ControllerSnapshot>,
}

impl<T: DeviceTransport> Engine<T> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Intent { intent, reply } => {
                    debug!(?intent, phase = %self.phase, "intent received");
                    let result = match intent {
                        Intent::Start => self.request_start().await,
                        Intent::Stop => {
                            self.request_stop().await;
                            Ok(())
                        }
                        Intent::SetAddress(address) => self.set_address(address).await,
                    };
                    // Callers waiting on the state channel must see the
                    // effect of their intent once the reply arrives.
                    self.publish();
                    let _ = reply.send(result);
                }
                Message::CommandDone {
                    seq,
                    enabled,
                    result,
                } => self.on_command_done(seq, enabled, result).await,
                Message::PollResult { session, outcome } => {
                    self.on_poll_result(session, outcome).await;
                }
                Message::Shutdown => break,
            }
            self.publish();
        }

        self.end_session().await;
        debug!("stream controller stopped");
    }

    // ── Intent handlers ──────────────────────────────────────────

    async fn request_start(&mut self) -> Result<(), CoreError> {
        let Some(address) = self.address else {
            return Err(ValidationError::AddressUnset.into());
        };
        if matches!(self.phase, Phase::Starting | Phase::Monitoring) {
            debug!(phase = %self.phase, "start requested while already active");
            return Ok(());
        }
        self.begin_start(address).await;
        Ok(())
    }

    async fn begin_start(&mut self, address: DeviceAddress) {
        self.end_session().await;
        self.desired = DesiredState::Streaming;
        // Nothing is known about the device until the new session polls it.
        self.observed = ObservedState::Unknown;
        self.clear_error();
        self.set_phase(Phase::Starting);
        self.send_command(address, true);
        self.start_session(address, PollMode::Continuous);
    }

    async fn request_stop(&mut self) {
        if matches!(self.phase, Phase::Idle | Phase::Stopping) && !self.probing {
            debug!(phase = %self.phase, "stop requested with nothing to stop");
            return;
        }
        self.desired = DesiredState::Stopped;
        self.end_session().await;
        self.observed = ObservedState::Unknown;
        self.clear_error();

        match self.address {
            Some(address) => {
                self.set_phase(Phase::Stopping);
                self.send_command(address, false);
            }
            None => self.set_phase(Phase::Idle),
        }
    }

    async fn set_address(&mut self, address: DeviceAddress) -> Result<(), CoreError> {
        if matches!(
            self.phase,
            Phase::Starting | Phase::Monitoring | Phase::Stopping
        ) {
            return Err(CoreError::AddressLocked { phase: self.phase });
        }

        self.repository.save(&address)?;
        self.address = Some(address);
        info!(%address, "device address updated");

        if self.probing || self.error_origin == Some(ErrorOrigin::Probe) {
            self.end_session().await;
            self.observed = ObservedState::Unknown;
            self.clear_error();
            self.set_phase(Phase::Idle);
            self.start_probe(address);
        } else if self.phase == Phase::Error {
            self.begin_start(address).await;
        }
        Ok(())
    }

    // ── Result handlers ──────────────────────────────────────────

    async fn on_command_done(
        &mut self,
        seq: u64,
        enabled: bool,
        result: Result<RawResponse, TransportError>,
    ) {
        if self.inflight != Some(seq) {
            trace!(seq, enabled, "dropping result of superseded command");
            return;
        }
        self.inflight = None;

        if !enabled {
            if let Err(e) = result {
                warn!(error = %e, "stop command failed");
            }
            self.set_phase(Phase::Idle);
            return;
        }

        match result {
            Ok(resp) => {
                debug!(status = resp.status, "start command acknowledged");
                self.set_phase(Phase::Monitoring);
                // A streaming poll that beat the ack is announced now. Otherwise
                // the first poll of the session reports the state.
                if self.observed == ObservedState::Streaming {
                    self.emit_change(ObservedState::Streaming, ChangeReason::CommandAck);
                }
            }
            Err(e) => {
                warn!(error = %e, "start command failed");
                self.end_session().await;
                self.desired = DesiredState::Stopped;
                self.observed = ObservedState::Unknown;
                self.fail(ErrorOrigin::Command, e.to_string(), ChangeReason::CommandFailure);
            }
        }
    }

    async fn on_poll_result(&mut self, session: SessionId, outcome: PollOutcome) {
        let Some(mode) = self
            .session
            .as_ref()
            .filter(|s| s.id() == session)
            .map(PollSession::mode)
        else {
            trace!(session, "dropping result of retired poll session");
            return;
        };

        let (observed, error) = match outcome {
            Ok(state) => (state, None),
            Err(e) => (e.observed(), Some(e.to_string())),
        };

        if mode == PollMode::Once {
            self.end_session().await;
            self.probing = false;
            self.on_probe_result(observed, error);
            return;
        }

        match (self.phase, observed) {
            (Phase::Starting, ObservedState::Streaming) => {
                trace!("device streaming before the start command was acknowledged");
                self.observed = ObservedState::Streaming;
            }
            (Phase::Starting, other) => {
                debug!(observed = %other, "deferring poll result until start settles");
            }
            (Phase::Monitoring | Phase::Error, ObservedState::Streaming) => {
                if self.phase == Phase::Error {
                    info!("device reachable again");
                    self.clear_error();
                    self.set_phase(Phase::Monitoring);
                }
                self.record(ObservedState::Streaming, ChangeReason::PollResult);
            }
            (Phase::Monitoring | Phase::Error, ObservedState::Stopped) => {
                info!("device stopped streaming");
                self.end_session().await;
                self.desired = DesiredState::Stopped;
                self.clear_error();
                self.set_phase(Phase::Idle);
                self.record(ObservedState::Stopped, ChangeReason::PollResult);
            }
            (Phase::Monitoring | Phase::Error, _) => {
                let message =
                    error.unwrap_or_else(|| format!("device reported {observed}"));
                if self.observed == ObservedState::Unreachable {
                    trace!(%message, "device still unreachable");
                    return;
                }
                warn!(%message, "status poll failed");
                self.observed = ObservedState::Unreachable;
                self.fail(ErrorOrigin::Poll, message, ChangeReason::Unreachable);
            }
            (phase, _) => {
                trace!(%phase, session, "dropping poll result outside a monitoring phase");
            }
        }
    }

    fn on_probe_result(&mut self, observed: ObservedState, error: Option<String>) {
        match (observed, self.address) {
            (ObservedState::Streaming, Some(address)) => {
                info!("device already streaming, resuming monitoring");
                self.desired = DesiredState::Streaming;
                self.record(ObservedState::Streaming, ChangeReason::PollResult);
                self.set_phase(Phase::Monitoring);
                self.start_session(address, PollMode::Continuous);
            }
            (ObservedState::Stopped, _) => {
                self.record(ObservedState::Stopped, ChangeReason::PollResult);
                self.set_phase(Phase::Idle);
            }
            _ => {
                let message = error.unwrap_or_else(|| format!("device reported {observed}"));
                warn!(%message, "startup probe failed");
                self.observed = ObservedState::Unreachable;
                self.fail(ErrorOrigin::Probe, message, ChangeReason::Unreachable);
            }
        }
    }

    // ── Sessions and commands ────────────────────────────────────

    fn start_probe(&mut self, address: DeviceAddress) {
        self.probing = true;
        self.start_session(address, PollMode::Once);
    }

    fn start_session(&mut self, address: DeviceAddress, mode: PollMode) {
        debug_assert!(self.session.is_none(), "previous poll session still alive");
        let tx = self.message_tx.clone();
        let session = self
            .poller
            .start(address, self.desired, mode, move |session, outcome| {
                let _ = tx.send(Message::PollResult { session, outcome });
            });
        self.session = Some(session);
    }

    /// Cancel the current session and wait for its task to exit.
    async fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            let (id, desired) = (session.id(), session.desired());
            session.cancel();
            session.await_termination().await;
            debug!(session = id, %desired, "poll session retired");
        }
        self.probing = false;
    }

    fn send_command(&mut self, address: DeviceAddress, enabled: bool) {
        self.command_seq += 1;
        let seq = self.command_seq;
        self.inflight = Some(seq);

        let transport = Arc::clone(self.poller.transport());
        let tx = self.message_tx.clone();
        debug!(seq, enabled, %address, "sending streaming command");
        tokio::spawn(async move {
            let result = transport.set_desired_state(&address, enabled).await;
            let _ = tx.send(Message::CommandDone {
                seq,
                enabled,
                result,
            });
        });
    }

    // ── State updates ────────────────────────────────────────────

    /// Store a newly observed state, emitting only on change.
    fn record(&mut self, observed: ObservedState, reason: ChangeReason) {
        if self.observed == observed {
            return;
        }
        self.observed = observed;
        self.emit_change(observed, reason);
    }

    fn emit_change(&self, observed: ObservedState, reason: ChangeReason) {
        let _ = self
            .event_tx
            .send(ControllerEvent::StateChanged(StateChangeEvent {
                observed,
                reason,
            }));
    }

    fn fail(&mut self, origin: ErrorOrigin, message: String, reason: ChangeReason) {
        self.error_origin = Some(origin);
        self.last_error = Some(message.clone());
        self.set_phase(Phase::Error);
        let _ = self
            .event_tx
            .send(ControllerEvent::ConnectionError { message, reason });
    }

    fn clear_error(&mut self) {
        self.error_origin = None;
        self.last_error = None;
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, "controller phase changed");
            self.phase = phase;
        }
    }

    fn publish(&self) {
        let next = ControllerSnapshot {
            phase: self.phase,
            desired: self.desired,
            observed: self.observed,
            address: self.address,
            probing: self.probing,
            last_error: self.last_error.clone(),
        };
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
