#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use rtmpctl_api::RawResponse;
use rtmpctl_core::{
    ChangeReason, ControllerConfig, ControllerEvent, CoreError, DesiredState, DeviceAddress,
    DeviceTransport, MemoryAddressRepository, ObservedState, Phase, StateChangeEvent,
    StreamController, TransportError, ValidationError,
};

// ── Scripted device ─────────────────────────────────────────────────

type Reply = Result<&'static str, TransportError>;

/// A device whose answers can be changed while the controller runs.
struct FakeDevice {
    status: Mutex<Reply>,
    status_delay: Mutex<Duration>,
    command: Mutex<Reply>,
    command_delay: Mutex<Duration>,
    status_calls: AtomicUsize,
    commands: Mutex<Vec<(DeviceAddress, bool)>>,
}

impl FakeDevice {
    fn new(status: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(Ok(status)),
            status_delay: Mutex::new(Duration::ZERO),
            command: Mutex::new(Ok("ok")),
            command_delay: Mutex::new(Duration::ZERO),
            status_calls: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        })
    }

    fn set_status(&self, reply: Reply) {
        *self.status.lock().unwrap() = reply;
    }

    fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    fn set_command(&self, reply: Reply, delay: Duration) {
        *self.command.lock().unwrap() = reply;
        *self.command_delay.lock().unwrap() = delay;
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn commands(&self) -> Vec<(DeviceAddress, bool)> {
        self.commands.lock().unwrap().clone()
    }

    fn enables(&self) -> Vec<bool> {
        self.commands().into_iter().map(|(_, enabled)| enabled).collect()
    }
}

fn respond(reply: Reply) -> Result<RawResponse, TransportError> {
    reply.map(|body| RawResponse {
        status: 200,
        body: body.to_owned(),
    })
}

struct FakeTransport(Arc<FakeDevice>);

impl DeviceTransport for FakeTransport {
    async fn set_desired_state(
        &self,
        address: &DeviceAddress,
        enabled: bool,
    ) -> Result<RawResponse, TransportError> {
        self.0.commands.lock().unwrap().push((*address, enabled));
        let delay = *self.0.command_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let reply = self.0.command.lock().unwrap().clone();
        respond(reply)
    }

    async fn get_observed_state(
        &self,
        _address: &DeviceAddress,
    ) -> Result<RawResponse, TransportError> {
        self.0.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.status_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let reply = self.0.status.lock().unwrap().clone();
        respond(reply)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn controller(
    device: &Arc<FakeDevice>,
    address: Option<&str>,
) -> (StreamController, Arc<MemoryAddressRepository>) {
    let address = address.map(|a| DeviceAddress::parse(a).unwrap());
    let repository = Arc::new(MemoryAddressRepository::new(address));
    let controller = StreamController::with_transport(
        FakeTransport(Arc::clone(device)),
        repository.clone(),
        ControllerConfig::default(),
    )
    .unwrap();
    (controller, repository)
}

async fn reach(controller: &StreamController, phase: Phase) {
    controller
        .wait_until(|s| s.phase == phase && !s.probing)
        .await
        .unwrap();
}

fn drain(rx: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn changed(observed: ObservedState, reason: ChangeReason) -> ControllerEvent {
    ControllerEvent::StateChanged(StateChangeEvent { observed, reason })
}

fn refused() -> TransportError {
    TransportError::ConnectionRefused {
        url: "http://10.0.0.1:8080/get_ctl?type=hdmi_main".into(),
    }
}

// ── Startup probe ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn probe_streaming_resumes_monitoring_without_duplicate_session() {
    let device = FakeDevice::new("1");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    assert!(ctl.snapshot().probing);
    assert!(!ctl.snapshot().controls_enabled());

    reach(&ctl, Phase::Monitoring).await;
    let snap = ctl.snapshot();
    assert_eq!(snap.observed, ObservedState::Streaming);
    assert_eq!(snap.desired, DesiredState::Streaming);

    ctl.request_start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(ctl.snapshot().phase, Phase::Monitoring);
    let stats = ctl.session_stats();
    assert_eq!(stats.started, 2, "probe plus one monitoring session");
    assert_eq!(stats.active, 1);
    assert_eq!(stats.peak_active, 1);
    assert!(device.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn probe_stopped_stays_idle_without_polling() {
    let device = FakeDevice::new("0");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    let mut events = ctl.subscribe();

    reach(&ctl, Phase::Idle).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(device.status_calls(), 1);
    assert_eq!(ctl.snapshot().observed, ObservedState::Stopped);
    assert_eq!(ctl.session_stats().active, 0);
    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Stopped, ChangeReason::PollResult)]
    );
}

#[tokio::test(start_paused = true)]
async fn probe_failure_reports_unreachable_and_new_address_reprobes() {
    let device = FakeDevice::new("0");
    device.set_status(Err(refused()));
    let (ctl, repo) = controller(&device, Some("10.0.0.1"));
    let mut events = ctl.subscribe();

    reach(&ctl, Phase::Error).await;
    assert_eq!(ctl.snapshot().observed, ObservedState::Unreachable);
    assert!(ctl.snapshot().controls_enabled());
    let first = drain(&mut events);
    assert_eq!(first.len(), 1);
    assert!(matches!(
        first[0],
        ControllerEvent::ConnectionError {
            reason: ChangeReason::Unreachable,
            ..
        }
    ));

    device.set_status(Ok("0"));
    ctl.set_address("10.0.0.3").await.unwrap();
    reach(&ctl, Phase::Idle).await;

    assert_eq!(ctl.snapshot().observed, ObservedState::Stopped);
    assert_eq!(ctl.snapshot().last_error, None);
    assert_eq!(repo.save_count(), 1);
    assert!(device.commands().is_empty(), "re-probe must not start streaming");
}

// ── Monitoring ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn remote_stop_while_monitoring_emits_once_and_ends_session() {
    let device = FakeDevice::new("1");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Monitoring).await;
    let mut events = ctl.subscribe();

    device.set_status(Ok("0"));
    reach(&ctl, Phase::Idle).await;
    let calls = device.status_calls();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Stopped, ChangeReason::PollResult)]
    );
    assert_eq!(ctl.snapshot().desired, DesiredState::Stopped);
    assert_eq!(ctl.session_stats().active, 0);
    assert_eq!(device.status_calls(), calls, "no polling after the session ended");
}

#[tokio::test(start_paused = true)]
async fn unrecognized_token_is_unreachable_until_device_recovers() {
    let device = FakeDevice::new("1");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Monitoring).await;
    let mut events = ctl.subscribe();

    device.set_status(Ok("maybe"));
    reach(&ctl, Phase::Error).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snap = ctl.snapshot();
    assert_eq!(snap.observed, ObservedState::Unreachable);
    assert!(snap.last_error.unwrap().contains("maybe"));
    let errors = drain(&mut events);
    assert_eq!(errors.len(), 1, "repeated failures report once: {errors:?}");
    assert_eq!(errors[0].reason(), ChangeReason::Unreachable);

    device.set_status(Ok("1"));
    reach(&ctl, Phase::Monitoring).await;
    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Streaming, ChangeReason::PollResult)]
    );
    assert_eq!(ctl.session_stats().peak_active, 1);
}

// ── Start and stop ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_without_address_fails_before_any_request() {
    let device = FakeDevice::new("1");
    let (ctl, _) = controller(&device, None);

    let err = ctl.request_start().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::AddressUnset)
    ));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(device.status_calls(), 0);
    assert!(device.commands().is_empty());
    assert_eq!(ctl.snapshot().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn start_then_acknowledged_enters_monitoring() {
    let device = FakeDevice::new("0");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    let mut events = ctl.subscribe();

    // The first poll sees the device streaming before the ack arrives.
    device.set_status(Ok("1"));
    device.set_command(Ok("ok"), Duration::from_millis(300));
    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Monitoring).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(device.enables(), vec![true]);
    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Streaming, ChangeReason::CommandAck)]
    );
    assert_eq!(ctl.snapshot().desired, DesiredState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn ack_before_any_poll_reports_state_from_the_first_poll() {
    let device = FakeDevice::new("0");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    let mut events = ctl.subscribe();

    device.set_status(Ok("1"));
    device.set_status_delay(Duration::from_millis(300));
    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Monitoring).await;
    assert_eq!(ctl.snapshot().observed, ObservedState::Unknown);
    assert!(drain(&mut events).is_empty(), "an ack alone says nothing about the device");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Streaming, ChangeReason::PollResult)]
    );
}

#[tokio::test(start_paused = true)]
async fn stopped_device_after_acknowledged_start_emits_stopped_once() {
    let device = FakeDevice::new("0");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    assert_eq!(ctl.snapshot().observed, ObservedState::Stopped);
    let mut events = ctl.subscribe();

    // The device acks the start but keeps reporting "0".
    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Idle).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        drain(&mut events),
        vec![changed(ObservedState::Stopped, ChangeReason::PollResult)]
    );
    let snap = ctl.snapshot();
    assert_eq!(snap.observed, ObservedState::Stopped);
    assert_eq!(snap.desired, DesiredState::Stopped);
    assert_eq!(device.enables(), vec![true]);
    assert_eq!(ctl.session_stats().active, 0);
}

#[tokio::test(start_paused = true)]
async fn garbage_after_failed_probe_and_start_enters_error() {
    let device = FakeDevice::new("0");
    device.set_status(Err(refused()));
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Error).await;
    assert_eq!(ctl.snapshot().observed, ObservedState::Unreachable);
    let mut events = ctl.subscribe();

    device.set_status(Ok("maybe"));
    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Error).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snap = ctl.snapshot();
    assert_eq!(snap.phase, Phase::Error);
    assert_eq!(snap.observed, ObservedState::Unreachable);
    assert!(snap.last_error.unwrap().contains("maybe"));
    let events = drain(&mut events);
    assert_eq!(events.len(), 1, "{events:?}");
    assert!(matches!(
        &events[0],
        ControllerEvent::ConnectionError {
            reason: ChangeReason::Unreachable,
            ..
        }
    ));
    assert_eq!(device.enables(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn command_timeout_enters_error_and_reenables_controls() {
    let device = FakeDevice::new("0");
    device.set_command(
        Err(TransportError::Timeout { timeout_ms: 500 }),
        Duration::from_millis(500),
    );
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    let mut events = ctl.subscribe();

    ctl.request_start().await.unwrap();
    assert_eq!(ctl.snapshot().phase, Phase::Starting);
    assert!(!ctl.snapshot().controls_enabled());

    reach(&ctl, Phase::Error).await;
    let snap = ctl.snapshot();
    assert!(snap.controls_enabled());
    assert!(snap.address_editable());
    assert_eq!(snap.desired, DesiredState::Stopped);
    assert_eq!(ctl.session_stats().active, 0);

    let events = drain(&mut events);
    assert_eq!(events.len(), 1, "{events:?}");
    assert!(matches!(
        &events[0],
        ControllerEvent::ConnectionError {
            reason: ChangeReason::CommandFailure,
            ..
        }
    ));

    // Still usable after the failure.
    device.set_command(Ok("ok"), Duration::ZERO);
    device.set_status(Ok("1"));
    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Monitoring).await;
}

#[tokio::test(start_paused = true)]
async fn stop_discards_results_from_the_retired_session() {
    let device = FakeDevice::new("1");
    device.set_status_delay(Duration::from_millis(400));
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Monitoring).await;
    let mut events = ctl.subscribe();

    // Land inside the second status request of the session.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    ctl.request_stop().await.unwrap();
    assert_eq!(ctl.snapshot().observed, ObservedState::Unknown);

    reach(&ctl, Phase::Idle).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snap = ctl.snapshot();
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.observed, ObservedState::Unknown);
    assert_eq!(snap.desired, DesiredState::Stopped);
    assert!(drain(&mut events).is_empty());
    assert_eq!(device.enables(), vec![false]);
    assert_eq!(ctl.session_stats().active, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_during_slow_start_ignores_the_superseded_ack() {
    let device = FakeDevice::new("0");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    device.set_command(Ok("ok"), Duration::from_secs(2));
    let mut events = ctl.subscribe();

    ctl.request_start().await.unwrap();
    ctl.request_stop().await.unwrap();
    assert_eq!(ctl.snapshot().phase, Phase::Stopping);

    reach(&ctl, Phase::Idle).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(ctl.snapshot().phase, Phase::Idle);
    assert_eq!(device.enables(), vec![true, false]);
    assert!(
        drain(&mut events)
            .iter()
            .all(|e| e.reason() != ChangeReason::CommandAck)
    );
}

#[tokio::test(start_paused = true)]
async fn at_most_one_session_across_start_stop_churn() {
    let device = FakeDevice::new("0");
    device.set_status_delay(Duration::from_millis(300));
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;
    device.set_status(Ok("1"));
    let counters = ctl.session_counters();

    for round in 0..10u64 {
        ctl.request_start().await.unwrap();
        ctl.request_start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150 * round)).await;
        ctl.request_stop().await.unwrap();
        assert!(counters.stats().active <= 1);
    }
    ctl.settled().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = ctl.session_stats();
    assert_eq!(stats.peak_active, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.started, stats.terminated);
    assert_eq!(stats.started, 11, "probe plus one session per round");
    assert_eq!(ctl.snapshot().phase, Phase::Idle);
}

// ── Address changes ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn malformed_addresses_are_rejected_without_saving() {
    let device = FakeDevice::new("0");
    let (ctl, repo) = controller(&device, None);

    for input in ["256.1.1.1", "1.2.3", "a.b.c.d", ""] {
        let err = ctl.set_address(input).await.unwrap_err();
        assert!(
            matches!(
                err,
                CoreError::Validation(ValidationError::MalformedAddress(_))
            ),
            "{input:?}: {err}"
        );
    }
    assert_eq!(repo.save_count(), 0);
    assert_eq!(ctl.snapshot().address, None);

    let address = ctl.set_address("192.168.1.10").await.unwrap();
    assert_eq!(repo.save_count(), 1);
    assert_eq!(repo.current(), Some(address));
    assert_eq!(ctl.snapshot().address, Some(address));
    assert_eq!(device.status_calls(), 0, "idle address change does not probe");
}

#[tokio::test(start_paused = true)]
async fn address_is_locked_while_monitoring() {
    let device = FakeDevice::new("1");
    let (ctl, repo) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Monitoring).await;

    let err = ctl.set_address("10.0.0.2").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::AddressLocked {
            phase: Phase::Monitoring
        }
    ));
    assert_eq!(repo.save_count(), 0);
    assert!(!ctl.snapshot().address_editable());
}

#[tokio::test(start_paused = true)]
async fn address_change_after_command_failure_retries_start() {
    let device = FakeDevice::new("0");
    device.set_command(Err(refused()), Duration::ZERO);
    let (ctl, repo) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Idle).await;

    ctl.request_start().await.unwrap();
    reach(&ctl, Phase::Error).await;

    device.set_command(Ok("ok"), Duration::ZERO);
    device.set_status(Ok("1"));
    let address = ctl.set_address("10.0.0.2").await.unwrap();
    reach(&ctl, Phase::Monitoring).await;

    let commands = device.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1], (address, true));
    assert_eq!(repo.current(), Some(address));
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_retires_the_session_and_rejects_intents() {
    let device = FakeDevice::new("1");
    let (ctl, _) = controller(&device, Some("10.0.0.1"));
    reach(&ctl, Phase::Monitoring).await;

    ctl.shutdown().await;
    assert_eq!(ctl.session_stats().active, 0);
    assert!(matches!(
        ctl.request_start().await,
        Err(CoreError::ControllerStopped)
    ));
}
