//! Simulation - deterministic stand-in for a camera, a model and a participant
//!
//! Drives a real session end to end without hardware:
//! - A simulated participant holds the pose the current task asks for, and
//!   with probability `1 - accuracy` strikes a random pose instead
//! - The participant doubles as a [`ScoreModel`] producing noisy confidences
//!   peaked at the held pose
//! - A seeded `StdRng` makes every run reproducible
//!
//! Used by the CLI `simulate` command and by the integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::classification::{ClassificationOutcome, Frame, LabelScores, ScoreModel, ScoringAdapter};
use crate::config::SessionConfig;
use crate::error::{ClassificationError, SessionError};
use crate::program::{TaskProgram, FACING_MODEL};
use crate::runner::RunnerEvent;
use crate::session::{SessionBuilder, SessionEvent, SessionHandle, SessionSnapshot};
use crate::telemetry::TelemetryHub;

/// Confidence range of the held pose
const PEAK_SCORE: (f32, f32) = (0.6, 0.9);

/// Confidence range of every other label
const NOISE_SCORE: (f32, f32) = (0.0, 0.2);

/// How often the simulated camera delivers a frame
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Knobs for one simulated run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOptions {
    pub seed: u64,
    /// Probability that the participant holds the requested pose on a frame
    pub accuracy: f32,
    /// Stop after this many completed tasks
    pub tasks_to_complete: usize,
    /// Divides every session period, so 10.0 runs ten times faster
    pub time_scale: f32,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            accuracy: 0.9,
            tasks_to_complete: 4,
            time_scale: 1.0,
        }
    }
}

impl SimulationOptions {
    /// Session config with auto-processing on and periods scaled down
    pub fn session_config(&self, base: &SessionConfig) -> SessionConfig {
        let scale = if self.time_scale.is_finite() && self.time_scale > 0.0 {
            self.time_scale
        } else {
            1.0
        };
        let scaled = |ms: u64| ((ms as f32 / scale).round() as u64).max(1);

        SessionConfig {
            countdown_tick_ms: scaled(base.countdown_tick_ms),
            auto_process_interval_ms: scaled(base.auto_process_interval_ms),
            cooldown_ms: scaled(base.cooldown_ms),
            classification_timeout_ms: scaled(base.classification_timeout_ms),
            auto_processing_enabled: true,
            ..base.clone()
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Names of completed tasks, in completion order
    pub completed: Vec<String>,
    pub requests: usize,
    pub failures: usize,
    pub countdown_resets: usize,
}

struct ParticipantState {
    pose: Option<usize>,
    rng: StdRng,
}

/// Simulated participant and score model in one
pub struct SimulatedParticipant {
    state: Mutex<ParticipantState>,
    accuracy: f32,
    label_count: usize,
}

impl SimulatedParticipant {
    pub fn new(program: &TaskProgram, seed: u64, accuracy: f32) -> Self {
        let label_count = program
            .tasks()
            .iter()
            .filter_map(|task| task.index_to_label_map.keys().next_back())
            .max()
            .map_or(1, |max| max + 1);

        Self {
            state: Mutex::new(ParticipantState {
                pose: None,
                rng: StdRng::seed_from_u64(seed),
            }),
            accuracy: accuracy.clamp(0.0, 1.0),
            label_count,
        }
    }

    /// Pose the participant is currently trying to hold
    pub fn pose(&self) -> Option<usize> {
        self.lock().pose
    }

    pub fn hold_pose(&self, label_index: usize) {
        self.lock().pose = Some(label_index);
    }

    /// Keep holding whatever the session's current task asks for
    pub fn follow(
        self: &Arc<Self>,
        program: TaskProgram,
        mut snapshots: watch::Receiver<SessionSnapshot>,
    ) -> JoinHandle<()> {
        let participant = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let task_index = snapshots.borrow_and_update().task_index;
                if let Some((index, label)) =
                    program.get(task_index).and_then(|task| task.primary_label())
                {
                    if participant.pose() != Some(index) {
                        tracing::debug!(index, label, "[Simulation] Participant changes pose");
                        participant.hold_pose(index);
                    }
                }
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ParticipantState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sample_scores(&self) -> LabelScores {
        let mut state = self.lock();
        let ParticipantState { pose, rng } = &mut *state;

        let peak = match *pose {
            Some(pose) if rng.gen::<f32>() < self.accuracy => Some(pose),
            _ if self.label_count > 1 => Some(rng.gen_range(0..self.label_count)),
            _ => None,
        };

        (0..self.label_count)
            .map(|index| {
                let score = if Some(index) == peak {
                    rng.gen_range(PEAK_SCORE.0..PEAK_SCORE.1)
                } else {
                    rng.gen_range(NOISE_SCORE.0..NOISE_SCORE.1)
                };
                (index, score)
            })
            .collect()
    }
}

impl ScoreModel for SimulatedParticipant {
    fn infer(
        &self,
        _frame: Frame,
        model_name: &str,
    ) -> BoxFuture<'static, Result<LabelScores, ClassificationError>> {
        if model_name != FACING_MODEL {
            return future::ready(Err(ClassificationError::UnknownModel {
                model: model_name.to_string(),
            }))
            .boxed();
        }
        future::ready(Ok(self.sample_scores())).boxed()
    }
}

/// A session wired to a simulated camera and participant
pub struct Simulation {
    pub handle: SessionHandle,
    pub participant: Arc<SimulatedParticipant>,
    tasks: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Spawn the session plus its camera and participant tasks
    pub fn start(
        program: TaskProgram,
        base: &SessionConfig,
        options: &SimulationOptions,
        telemetry: Option<Arc<TelemetryHub>>,
    ) -> Self {
        let participant = Arc::new(SimulatedParticipant::new(
            &program,
            options.seed,
            options.accuracy,
        ));
        let adapter = Arc::new(ScoringAdapter::from_arc(Arc::clone(&participant)));

        let mut builder = SessionBuilder::new(program.clone(), adapter)
            .config(options.session_config(base));
        if let Some(telemetry) = telemetry {
            builder = builder.telemetry(telemetry);
        }
        let handle = builder.spawn();

        let follower = participant.follow(program, handle.watch_snapshots());
        let camera = spawn_camera(handle.clone());

        tracing::info!(
            seed = options.seed,
            accuracy = options.accuracy,
            "[Simulation] Started"
        );

        Self {
            handle,
            participant,
            tasks: vec![follower, camera],
        }
    }

    /// Run until enough tasks have completed, reporting every event
    pub async fn run_until_complete<F>(
        self,
        tasks_to_complete: usize,
        mut on_event: F,
    ) -> Result<SimulationReport, SessionError>
    where
        F: FnMut(&SessionEvent),
    {
        let mut report = SimulationReport::default();
        let mut events = Box::pin(self.handle.event_stream());

        while report.completed.len() < tasks_to_complete {
            let Some(event) = events.next().await else {
                break;
            };
            on_event(&event);

            match &event {
                SessionEvent::ClassificationSubmitted { .. } => report.requests += 1,
                SessionEvent::ClassificationFinished {
                    outcome: ClassificationOutcome::Failed { .. },
                    ..
                } => report.failures += 1,
                SessionEvent::Runner {
                    event: RunnerEvent::CountdownReset { .. },
                } => report.countdown_resets += 1,
                SessionEvent::Runner {
                    event: RunnerEvent::TaskCompleted { task_name, .. },
                } => report.completed.push(task_name.clone()),
                _ => {}
            }
        }

        self.stop().await?;
        Ok(report)
    }

    pub async fn stop(self) -> Result<(), SessionError> {
        for task in &self.tasks {
            task.abort();
        }
        match self.handle.shutdown().await {
            Ok(()) | Err(SessionError::Closed) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn spawn_camera(handle: SessionHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        loop {
            ticker.tick().await;
            match handle.submit_frame(Some(Frame::blank())) {
                Ok(()) | Err(SessionError::ChannelFull) => {}
                Err(_) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_space_covers_every_vocabulary() {
        let participant = SimulatedParticipant::new(&TaskProgram::default_program(), 1, 1.0);
        assert_eq!(participant.label_count, 8);
    }

    #[test]
    fn accurate_participant_peaks_at_held_pose() {
        let participant = SimulatedParticipant::new(&TaskProgram::default_program(), 7, 1.0);
        participant.hold_pose(2);
        for _ in 0..20 {
            let scores = participant.sample_scores();
            let best = scores
                .iter()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(index, _)| *index);
            assert_eq!(best, Some(2));
        }
    }

    #[test]
    fn same_seed_gives_same_scores() {
        let program = TaskProgram::default_program();
        let a = SimulatedParticipant::new(&program, 99, 0.5);
        let b = SimulatedParticipant::new(&program, 99, 0.5);
        a.hold_pose(0);
        b.hold_pose(0);
        assert_eq!(a.sample_scores(), b.sample_scores());
    }

    #[test]
    fn time_scale_shrinks_periods() {
        let options = SimulationOptions {
            time_scale: 10.0,
            ..SimulationOptions::default()
        };
        let config = options.session_config(&SessionConfig::default());
        assert_eq!(config.countdown_tick_ms, 100);
        assert_eq!(config.cooldown_ms, 200);
        assert!(config.auto_processing_enabled);

        let broken = SimulationOptions {
            time_scale: 0.0,
            ..SimulationOptions::default()
        };
        assert_eq!(
            broken.session_config(&SessionConfig::default()).countdown_tick_ms,
            1000
        );
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let participant = SimulatedParticipant::new(&TaskProgram::default_program(), 1, 1.0);
        let result = participant.infer(Frame::blank(), "other-model").await;
        assert!(matches!(
            result,
            Err(ClassificationError::UnknownModel { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn accurate_participant_completes_tasks() {
        let simulation = Simulation::start(
            TaskProgram::default_program(),
            &SessionConfig::default(),
            &SimulationOptions {
                accuracy: 1.0,
                ..SimulationOptions::default()
            },
            Some(Arc::new(TelemetryHub::default())),
        );

        let report = simulation.run_until_complete(2, |_| {}).await.unwrap();
        assert_eq!(report.completed, vec!["Turn head left", "Face forward"]);
        assert_eq!(report.failures, 0);
        assert_eq!(report.countdown_resets, 0);
    }
}
