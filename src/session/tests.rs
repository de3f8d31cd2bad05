use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use super::*;
use crate::audio::{AudioCue, RecordingCuePlayer};
use crate::classification::{ClassificationOutcome, ClassificationRequest, LabelMap};
use crate::config::FailurePolicy;
use crate::error::ClassificationError;
use crate::runner::{Phase, RunnerEvent};
use crate::telemetry::{LifecyclePhase, MetricEvent};

/// Adapter answering every request with the same labels
struct FixedAdapter {
    labels: LabelMap,
    calls: AtomicUsize,
}

impl FixedAdapter {
    fn new(pairs: &[(usize, &str)]) -> Arc<Self> {
        Arc::new(Self {
            labels: pairs.iter().map(|(i, n)| (*i, n.to_string())).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ClassificationAdapter for FixedAdapter {
    fn classify(
        &self,
        _request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let labels = self.labels.clone();
        async move { Ok(labels) }.boxed()
    }
}

struct FailingAdapter;

impl ClassificationAdapter for FailingAdapter {
    fn classify(
        &self,
        _request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        async move {
            Err(ClassificationError::AdapterFailed {
                reason: "camera busy".to_string(),
            })
        }
        .boxed()
    }
}

/// Sets its flag when the future holding it is dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Adapter whose futures never resolve
#[derive(Default)]
struct StuckAdapter {
    calls: AtomicUsize,
    dropped: Arc<AtomicBool>,
}

impl ClassificationAdapter for StuckAdapter {
    fn classify(
        &self,
        _request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = DropFlag(Arc::clone(&self.dropped));
        async move {
            let _guard = guard;
            std::future::pending::<Result<LabelMap, ClassificationError>>().await
        }
        .boxed()
    }
}

/// Adapter whose futures panic when polled
#[derive(Default)]
struct PanickingAdapter {
    calls: AtomicUsize,
}

impl ClassificationAdapter for PanickingAdapter {
    fn classify(
        &self,
        _request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move { panic!("model crashed") }.boxed()
    }
}

fn auto_config() -> SessionConfig {
    SessionConfig {
        auto_processing_enabled: true,
        ..SessionConfig::default()
    }
}

fn spawn(
    adapter: Arc<dyn ClassificationAdapter>,
    config: SessionConfig,
) -> (SessionHandle, Arc<RecordingCuePlayer>, Arc<TelemetryHub>) {
    let cues = Arc::new(RecordingCuePlayer::new());
    let hub = Arc::new(TelemetryHub::default());
    let handle = SessionBuilder::new(TaskProgram::default_program(), adapter)
        .config(config)
        .cue_player(cues.clone())
        .telemetry(hub.clone())
        .spawn();
    (handle, cues, hub)
}

async fn advance_to(start: tokio::time::Instant, secs: f32) {
    tokio::time::sleep_until(start + Duration::from_secs_f32(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn reported_condition_runs_countdown_and_advances() {
    let start = tokio::time::Instant::now();
    let (handle, cues, hub) = spawn(FixedAdapter::new(&[]), SessionConfig::default());

    handle
        .report_condition(ConditionEvent::met("Turn head left"))
        .await
        .unwrap();

    advance_to(start, 2.5).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::CountingDown);
    assert_eq!(snapshot.countdown, 2);
    assert_eq!(snapshot.status_text, "Countdown: 2s");

    advance_to(start, 4.5).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Cooldown);
    assert!(snapshot.task_completed);
    assert_eq!(snapshot.status_text, "Task complete!");
    assert_eq!(
        cues.played(),
        vec![
            AudioCue::Tick,
            AudioCue::Tick,
            AudioCue::Tick,
            AudioCue::Tick,
            AudioCue::Success
        ]
    );

    advance_to(start, 6.5).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.task_index, 1);
    assert_eq!(snapshot.task_name, "Face forward");
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(!snapshot.task_completed);
    assert_eq!(snapshot.upcoming, vec!["Face forward", "Turn head right"]);

    assert!(hub
        .snapshot()
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::TaskCompleted { task_index: 0, .. })));
}

#[tokio::test(start_paused = true)]
async fn not_met_discards_progress() {
    let start = tokio::time::Instant::now();
    let (handle, cues, _hub) = spawn(FixedAdapter::new(&[]), SessionConfig::default());

    handle
        .report_condition(ConditionEvent::met("Turn head left"))
        .await
        .unwrap();
    advance_to(start, 2.5).await;
    handle
        .report_condition(ConditionEvent::not_met("Turn head left"))
        .await
        .unwrap();

    advance_to(start, 6.0).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.countdown, 0);
    assert_eq!(snapshot.task_index, 0);
    assert_eq!(snapshot.status_text, "Condition not met");
    assert_eq!(cues.count(AudioCue::Tick), 2);
    assert_eq!(cues.count(AudioCue::Success), 0);

    // Restart begins from the full duration
    handle
        .report_condition(ConditionEvent::met("Turn head left"))
        .await
        .unwrap();
    advance_to(start, 6.5).await;
    assert_eq!(handle.snapshot().countdown, 4);
}

#[tokio::test(start_paused = true)]
async fn stale_condition_is_discarded_and_recorded() {
    let (handle, _cues, hub) = spawn(FixedAdapter::new(&[]), SessionConfig::default());
    let before = handle.snapshot();

    handle
        .report_condition(ConditionEvent::met("Look up"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(handle.snapshot(), before);
    assert!(hub.snapshot().recent.contains(&MetricEvent::StaleEventDiscarded {
        current_task: "Turn head left".to_string(),
        event_task: "Look up".to_string(),
    }));
}

#[tokio::test(start_paused = true)]
async fn classified_frames_drive_the_runner() {
    let start = tokio::time::Instant::now();
    let adapter = FixedAdapter::new(&[(1, "left")]);
    let (handle, cues, _hub) = spawn(adapter.clone(), auto_config());
    let mut events = handle.subscribe_events();

    handle.submit_frame(Some(Frame::blank())).unwrap();

    // First auto tick at 1s submits, the countdown starts from there
    advance_to(start, 1.5).await;
    assert_eq!(adapter.calls(), 1);
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::CountingDown);
    assert_eq!(snapshot.countdown, 4);

    let mut saw_started = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Runner {
            event: RunnerEvent::CountdownStarted { duration_secs, .. },
        } = event
        {
            assert_eq!(duration_secs, 4);
            saw_started = true;
        }
    }
    assert!(saw_started);

    advance_to(start, 5.5).await;
    assert_eq!(handle.snapshot().phase, Phase::Cooldown);
    assert_eq!(cues.count(AudioCue::Success), 1);
}

#[tokio::test(start_paused = true)]
async fn one_request_in_flight_until_timeout() {
    let start = tokio::time::Instant::now();
    let adapter = Arc::new(StuckAdapter::default());
    let (handle, _cues, hub) = spawn(adapter.clone(), auto_config());

    handle.submit_frame(Some(Frame::blank())).unwrap();

    advance_to(start, 1.5).await;
    assert!(handle.snapshot().in_flight);

    advance_to(start, 5.5).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);

    // Timed out at 6s, the gate opens again on the next tick
    advance_to(start, 7.5).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    assert!(adapter.dropped.load(Ordering::SeqCst));
    assert!(hub
        .snapshot()
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::ClassificationFailed { code: 3002, .. })));
}

#[tokio::test(start_paused = true)]
async fn adapter_panic_releases_the_gate() {
    let start = tokio::time::Instant::now();
    let adapter = Arc::new(PanickingAdapter::default());
    let (handle, _cues, hub) = spawn(adapter.clone(), auto_config());
    let mut events = handle.subscribe_events();

    handle.submit_frame(Some(Frame::blank())).unwrap();

    advance_to(start, 1.5).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    assert!(!handle.snapshot().in_flight);

    // Every later auto tick submits again
    advance_to(start, 4.5).await;
    assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
    assert!(!handle.is_closed());
    assert_eq!(handle.snapshot().phase, Phase::Idle);

    let mut failure_message = None;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ClassificationFinished {
            outcome: ClassificationOutcome::Failed { code, message },
            ..
        } = event
        {
            assert_eq!(code, 3001);
            failure_message = Some(message);
        }
    }
    let failure_message = failure_message.expect("failure event");
    assert!(failure_message.contains("model crashed"), "{failure_message}");
    assert!(hub
        .snapshot()
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::ClassificationFailed { code: 3001, .. })));
}

#[tokio::test(start_paused = true)]
async fn ignored_failure_keeps_countdown() {
    let start = tokio::time::Instant::now();
    let (handle, _cues, hub) = spawn(Arc::new(FailingAdapter), auto_config());

    handle.submit_frame(Some(Frame::blank())).unwrap();
    handle
        .report_condition(ConditionEvent::met("Turn head left"))
        .await
        .unwrap();

    advance_to(start, 2.5).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::CountingDown);
    assert_eq!(snapshot.countdown, 2);
    assert!(!snapshot.in_flight);
    assert!(hub
        .snapshot()
        .recent
        .iter()
        .any(|event| matches!(event, MetricEvent::ClassificationFailed { code: 3001, .. })));
}

#[tokio::test(start_paused = true)]
async fn failure_treated_as_not_met_resets_countdown() {
    let start = tokio::time::Instant::now();
    let config = SessionConfig {
        failure_policy: FailurePolicy::TreatAsNotMet,
        ..auto_config()
    };
    let (handle, cues, _hub) = spawn(Arc::new(FailingAdapter), config);

    handle.submit_frame(Some(Frame::blank())).unwrap();
    handle
        .report_condition(ConditionEvent::met("Turn head left"))
        .await
        .unwrap();

    advance_to(start, 2.5).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.countdown, 0);
    assert_eq!(cues.count(AudioCue::Success), 0);
}

#[tokio::test(start_paused = true)]
async fn gate_requires_toggle_and_frame() {
    let start = tokio::time::Instant::now();

    let adapter = FixedAdapter::new(&[(0, "front")]);
    let (handle, _cues, _hub) = spawn(adapter.clone(), SessionConfig::default());
    handle.submit_frame(Some(Frame::blank())).unwrap();
    advance_to(start, 3.5).await;
    assert_eq!(adapter.calls(), 0, "auto-processing is off");

    handle.set_auto_processing(true).await.unwrap();
    advance_to(start, 4.5).await;
    assert_eq!(adapter.calls(), 1);
    assert!(handle.snapshot().auto_processing_enabled);

    let adapter = FixedAdapter::new(&[(0, "front")]);
    let (_handle, _cues, _hub) = spawn(adapter.clone(), auto_config());
    advance_to(start, 8.5).await;
    assert_eq!(adapter.calls(), 0, "no frame yet");
}

#[tokio::test(start_paused = true)]
async fn cleared_frame_stops_submissions() {
    let start = tokio::time::Instant::now();
    // Labels that never satisfy the first task keep the session idle
    let adapter = FixedAdapter::new(&[(0, "front")]);
    let (handle, _cues, _hub) = spawn(adapter.clone(), auto_config());

    handle.submit_frame(Some(Frame::blank())).unwrap();
    advance_to(start, 1.5).await;
    assert_eq!(adapter.calls(), 1);

    handle.submit_frame(None).unwrap();
    advance_to(start, 5.5).await;
    assert_eq!(adapter.calls(), 1);
    assert_eq!(handle.snapshot().phase, Phase::Idle);

    handle.submit_frame(Some(Frame::blank())).unwrap();
    advance_to(start, 6.5).await;
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_submissions_during_cooldown() {
    let start = tokio::time::Instant::now();
    let adapter = FixedAdapter::new(&[(1, "left")]);
    let (handle, _cues, _hub) = spawn(adapter.clone(), auto_config());
    handle.submit_frame(Some(Frame::blank())).unwrap();

    // MET at 1s, completion at 5s, cooldown until 7s
    advance_to(start, 5.5).await;
    assert_eq!(handle.snapshot().phase, Phase::Cooldown);
    let calls_at_cooldown = adapter.calls();

    advance_to(start, 6.9).await;
    assert_eq!(handle.snapshot().phase, Phase::Cooldown);
    assert_eq!(adapter.calls(), calls_at_cooldown);

    advance_to(start, 7.5).await;
    assert_eq!(handle.snapshot().task_index, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_in_flight_and_closes() {
    let start = tokio::time::Instant::now();
    let adapter = Arc::new(StuckAdapter::default());
    let (handle, _cues, hub) = spawn(adapter.clone(), auto_config());
    let mut snapshots = handle.watch_snapshots();

    handle.submit_frame(Some(Frame::blank())).unwrap();
    advance_to(start, 1.5).await;
    assert!(handle.snapshot().in_flight);

    handle.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(adapter.dropped.load(Ordering::SeqCst));
    assert!(handle.is_closed());
    assert_eq!(
        handle.submit_frame(Some(Frame::blank())),
        Err(SessionError::Closed)
    );
    assert_eq!(
        handle.set_auto_processing(false).await,
        Err(SessionError::Closed)
    );
    assert_eq!(
        handle
            .report_condition(ConditionEvent::met("Turn head left"))
            .await,
        Err(SessionError::Closed)
    );

    snapshots.borrow_and_update();
    assert!(snapshots.changed().await.is_err());
    assert!(hub.snapshot().recent.iter().any(|event| matches!(
        event,
        MetricEvent::Lifecycle {
            phase: LifecyclePhase::SessionStopped,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_the_loop() {
    let (handle, _cues, hub) = spawn(FixedAdapter::new(&[]), SessionConfig::default());
    let mut snapshots = handle.watch_snapshots();
    snapshots.borrow_and_update();
    drop(handle);

    assert!(snapshots.changed().await.is_err());
    assert!(hub.snapshot().recent.iter().any(|event| matches!(
        event,
        MetricEvent::Lifecycle {
            phase: LifecyclePhase::SessionStopped,
            ..
        }
    )));
}
