// SessionLoop - the single task that owns the runner
//
// Every timer and every channel the runner depends on is polled from one
// select! loop. Handlers run to completion before the next branch is polled,
// so runner transitions are never interleaved.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use crate::audio::CuePlayer;
use crate::classification::{
    ClassificationAdapter, ClassificationOutcome, ClassificationRequest, Frame, LabelMap,
};
use crate::config::{FailurePolicy, SessionConfig};
use crate::error::{log_classification_error, ClassificationError, ErrorCode};
use crate::evaluator::{Condition, ConditionEvaluator, ConditionEvent};
use crate::runner::{RunnerEvent, TaskRunner};
use crate::telemetry::{DiagnosticError, LifecyclePhase, TelemetryHub};

use super::{SessionCommand, SessionEvent, SessionSnapshot};

/// Reply sent back by a classification worker
#[derive(Debug)]
struct ClassificationReply {
    id: u64,
    result: Result<LabelMap, ClassificationError>,
}

/// Bookkeeping for the single outstanding request
struct InFlight {
    id: u64,
    task_name: String,
    started: Instant,
    handle: JoinHandle<()>,
}

pub(super) struct SessionLoop {
    runner: TaskRunner,
    config: SessionConfig,
    adapter: Arc<dyn ClassificationAdapter>,
    cues: Arc<dyn CuePlayer>,
    telemetry: Arc<TelemetryHub>,
    commands: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
    replies_tx: mpsc::Sender<ClassificationReply>,
    replies_rx: mpsc::Receiver<ClassificationReply>,
    latest_frame: Option<Frame>,
    auto_processing: bool,
    in_flight: Option<InFlight>,
    next_request_id: u64,
    cooldown: Option<Pin<Box<Sleep>>>,
}

impl SessionLoop {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        runner: TaskRunner,
        config: SessionConfig,
        adapter: Arc<dyn ClassificationAdapter>,
        cues: Arc<dyn CuePlayer>,
        telemetry: Arc<TelemetryHub>,
        commands: mpsc::Receiver<SessionCommand>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        events_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (replies_tx, replies_rx) = mpsc::channel(4);
        let auto_processing = config.auto_processing_enabled;
        Self {
            runner,
            config,
            adapter,
            cues,
            telemetry,
            commands,
            snapshot_tx,
            events_tx,
            replies_tx,
            replies_rx,
            latest_frame: None,
            auto_processing,
            in_flight: None,
            next_request_id: 1,
            cooldown: None,
        }
    }

    pub(super) async fn run(mut self) {
        let mut countdown_ticks = periodic(self.config.countdown_tick());
        let mut auto_ticks = periodic(self.config.auto_process_interval());

        self.telemetry.record_lifecycle(LifecyclePhase::SessionStarted);
        tracing::info!(
            tasks = self.runner.program().len(),
            auto_processing = self.auto_processing,
            "[Session] Started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command, &mut countdown_ticks),
                },
                _ = countdown_ticks.tick() => {
                    let events = self.runner.on_countdown_tick();
                    self.apply(events, &mut countdown_ticks);
                }
                _ = auto_ticks.tick() => self.try_submit(),
                Some(reply) = self.replies_rx.recv() => {
                    self.handle_reply(reply, &mut countdown_ticks);
                }
                _ = cooldown_elapsed(&mut self.cooldown) => {
                    self.cooldown = None;
                    let events = self.runner.on_cooldown_elapsed();
                    self.apply(events, &mut countdown_ticks);
                }
            }
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: SessionCommand, countdown_ticks: &mut Interval) {
        match command {
            SessionCommand::SubmitFrame(frame) => self.latest_frame = frame,
            SessionCommand::SetAutoProcessing(enabled) => {
                if self.auto_processing != enabled {
                    tracing::info!(enabled, "[Session] Auto-processing toggled");
                }
                self.auto_processing = enabled;
                self.emit(SessionEvent::AutoProcessingChanged { enabled });
                self.publish_snapshot();
            }
            SessionCommand::ReportCondition(event) => {
                self.dispatch_condition(event, countdown_ticks)
            }
            SessionCommand::Shutdown => {}
        }
    }

    /// Auto-process gate, evaluated on every auto-process tick
    fn try_submit(&mut self) {
        if !self.auto_processing || self.in_flight.is_some() {
            return;
        }
        if !self.runner.phase().admits_frames() {
            return;
        }
        let Some(frame) = self.latest_frame.clone() else {
            return;
        };

        let id = self.next_request_id;
        self.next_request_id += 1;

        let request = ClassificationRequest::for_task(id, frame, self.runner.current_task());
        let task_name = request.task_name.clone();
        let adapter = Arc::clone(&self.adapter);
        let replies = self.replies_tx.clone();
        let limit = self.config.classification_timeout();

        // Every spawned request ends in a reply, adapter panics included
        let handle = tokio::spawn(async move {
            let work = async move { time::timeout(limit, adapter.classify(request)).await };
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(ClassificationError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
                Err(panic) => Err(ClassificationError::AdapterFailed {
                    reason: format!("adapter panicked: {}", panic_reason(panic.as_ref())),
                }),
            };
            let _ = replies.send(ClassificationReply { id, result }).await;
        });

        tracing::debug!(request_id = id, task = %task_name, "[Session] Classification submitted");
        self.in_flight = Some(InFlight {
            id,
            task_name: task_name.clone(),
            started: Instant::now(),
            handle,
        });
        self.emit(SessionEvent::ClassificationSubmitted {
            request_id: id,
            task_name,
        });
        self.publish_snapshot();
    }

    fn handle_reply(&mut self, reply: ClassificationReply, countdown_ticks: &mut Interval) {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.id == reply.id => in_flight,
            other => {
                self.in_flight = other;
                tracing::debug!(
                    request_id = reply.id,
                    "[Session] Dropping late classification reply"
                );
                self.telemetry.record_error(
                    DiagnosticError::LateResultDropped,
                    format!("request {}", reply.id),
                );
                return;
            }
        };

        let task_name = in_flight.task_name;
        match reply.result {
            Ok(labels) => {
                let latency_ms = in_flight.started.elapsed().as_secs_f32() * 1000.0;
                self.telemetry.record_classification_latency(latency_ms);

                // Evaluate against the task the request was issued for; the
                // runner discards the result if the session has moved on.
                let condition = self
                    .runner
                    .program()
                    .tasks()
                    .iter()
                    .find(|task| task.name == task_name)
                    .map(|task| ConditionEvaluator::evaluate_task(task, &labels))
                    .unwrap_or(Condition::NotMet);

                self.emit(SessionEvent::ClassificationFinished {
                    request_id: reply.id,
                    task_name: task_name.clone(),
                    outcome: ClassificationOutcome::Labels { labels },
                });
                self.dispatch_condition(
                    ConditionEvent {
                        task_name,
                        condition,
                    },
                    countdown_ticks,
                );
            }
            Err(err) => {
                log_classification_error(&err, "SessionLoop::handle_reply");
                self.telemetry
                    .record_classification_failure(&task_name, err.code());
                self.emit(SessionEvent::ClassificationFinished {
                    request_id: reply.id,
                    task_name: task_name.clone(),
                    outcome: ClassificationOutcome::Failed {
                        code: err.code(),
                        message: err.message(),
                    },
                });

                match self.config.failure_policy {
                    FailurePolicy::Ignore => self.publish_snapshot(),
                    FailurePolicy::TreatAsNotMet => {
                        let event = ConditionEvent::not_met(task_name);
                        self.dispatch_condition(event, countdown_ticks)
                    }
                }
            }
        }
    }

    fn dispatch_condition(&mut self, event: ConditionEvent, countdown_ticks: &mut Interval) {
        self.emit(SessionEvent::Condition {
            event: event.clone(),
        });
        let events = self.runner.on_condition(&event);
        self.apply(events, countdown_ticks);
    }

    /// Drive side effects for runner events, then publish
    fn apply(&mut self, events: Vec<RunnerEvent>, countdown_ticks: &mut Interval) {
        let mut queue: VecDeque<RunnerEvent> = events.into();

        while let Some(event) = queue.pop_front() {
            match &event {
                RunnerEvent::CountdownStarted { .. } => countdown_ticks.reset(),
                RunnerEvent::TaskCompleted {
                    task_index,
                    task_name,
                } => {
                    self.telemetry.record_task_completed(task_name, *task_index);
                    queue.extend(self.runner.begin_cooldown());
                    self.cooldown = Some(Box::pin(time::sleep(self.config.cooldown())));
                }
                RunnerEvent::StaleEventDiscarded {
                    current_task,
                    event_task,
                } => self.telemetry.record_stale_event(current_task, event_task),
                RunnerEvent::IndexReset { invalid_index, len } => self.telemetry.record_error(
                    DiagnosticError::InvalidTaskIndex,
                    format!("index {} out of {} tasks", invalid_index, len),
                ),
                _ => {}
            }

            if let Some(cue) = event.cue() {
                self.cues.play(cue);
            }
            self.emit(SessionEvent::Runner { event });
        }

        self.publish_snapshot();
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    fn publish_snapshot(&self) {
        let next = SessionSnapshot::capture(
            &self.runner,
            self.auto_processing,
            self.in_flight.is_some(),
        );
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn teardown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!(
                request_id = in_flight.id,
                "[Session] Aborting in-flight classification"
            );
            in_flight.handle.abort();
        }
        self.cooldown = None;
        self.commands.close();
        self.telemetry.record_lifecycle(LifecyclePhase::SessionStopped);
        tracing::info!(task_index = self.runner.task_index(), "[Session] Stopped");
    }
}

fn periodic(period: time::Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

async fn cooldown_elapsed(cooldown: &mut Option<Pin<Box<Sleep>>>) {
    match cooldown.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
