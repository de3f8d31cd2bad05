// TaskRunner - single owner of task index, countdown and phase
//
// All mutation goes through the transition methods below. Each returns the
// events it produced, in order, so callers can drive audio cues, telemetry
// and presentation without inspecting fields.

use crate::error::{log_session_error, SessionError};
use crate::evaluator::{Condition, ConditionEvent};
use crate::program::{TaskDefinition, TaskProgram};
use crate::runner::phase::{Phase, RunnerEvent, Status};

/// TaskRunner walks a [`TaskProgram`] one task at a time
#[derive(Debug, Clone)]
pub struct TaskRunner {
    program: TaskProgram,
    task_index: usize,
    phase: Phase,
    /// Seconds remaining; only meaningful while counting down
    countdown: u32,
    task_completed: bool,
    status: Status,
}

impl TaskRunner {
    /// Create a runner positioned on the first task, idle
    pub fn new(program: TaskProgram) -> Self {
        Self {
            program,
            task_index: 0,
            phase: Phase::Idle,
            countdown: 0,
            task_completed: false,
            status: Status::Preparing,
        }
    }

    pub fn program(&self) -> &TaskProgram {
        &self.program
    }

    pub fn task_index(&self) -> usize {
        self.task_index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// True from completion until the runner advances to the next task
    pub fn task_completed(&self) -> bool {
        self.task_completed
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Task the runner is currently on
    pub fn current_task(&self) -> &TaskDefinition {
        let tasks = self.program.tasks();
        tasks.get(self.task_index).unwrap_or(&tasks[0])
    }

    /// Current task followed by the next one, without wrapping
    pub fn upcoming(&self) -> &[TaskDefinition] {
        let tasks = self.program.tasks();
        let start = self.task_index.min(tasks.len());
        let end = (start + 2).min(tasks.len());
        &tasks[start..end]
    }

    /// React to a condition decision
    ///
    /// Events tagged with any task other than the current one are discarded.
    pub fn on_condition(&mut self, event: &ConditionEvent) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        self.check_index(&mut events);

        let current = self.current_task();
        if event.task_name != current.name {
            tracing::debug!(
                current = %current.name,
                received = %event.task_name,
                "[TaskRunner] Discarding stale condition event"
            );
            events.push(RunnerEvent::StaleEventDiscarded {
                current_task: current.name.clone(),
                event_task: event.task_name.clone(),
            });
            return events;
        }

        match event.condition {
            Condition::Met => self.handle_met(&mut events),
            Condition::NotMet => self.handle_not_met(&mut events),
        }
        events
    }

    fn handle_met(&mut self, events: &mut Vec<RunnerEvent>) {
        if self.phase != Phase::Idle {
            return;
        }

        let task = self.current_task();
        let duration_secs = task.duration_secs;
        let task_name = task.name.clone();

        self.phase = Phase::CountingDown;
        self.countdown = duration_secs;
        self.task_completed = false;
        self.status = Status::Countdown {
            remaining_secs: duration_secs,
        };

        tracing::info!(
            task = %task_name,
            duration_secs,
            "[TaskRunner] Condition met, countdown started"
        );
        events.push(RunnerEvent::CountdownStarted {
            task_index: self.task_index,
            task_name,
            duration_secs,
        });
    }

    fn handle_not_met(&mut self, events: &mut Vec<RunnerEvent>) {
        match self.phase {
            Phase::CountingDown => {
                let discarded_secs = self.countdown;
                self.phase = Phase::Idle;
                self.countdown = 0;
                self.status = Status::ConditionNotMet;

                tracing::info!(
                    task = %self.current_task().name,
                    discarded_secs,
                    "[TaskRunner] Condition lost, countdown reset"
                );
                events.push(RunnerEvent::CountdownReset {
                    task_index: self.task_index,
                    task_name: self.current_task().name.clone(),
                    discarded_secs,
                });
            }
            Phase::Idle => self.status = Status::ConditionNotMet,
            Phase::Completed | Phase::Cooldown => {}
        }
    }

    /// Advance the countdown by one second
    ///
    /// The tick that brings the countdown to zero also completes the task, so
    /// a task of duration N completes on its Nth tick.
    pub fn on_countdown_tick(&mut self) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        self.check_index(&mut events);

        if self.phase != Phase::CountingDown {
            return events;
        }

        if self.countdown > 0 {
            self.countdown -= 1;
            self.status = Status::Countdown {
                remaining_secs: self.countdown,
            };
            tracing::debug!(remaining_secs = self.countdown, "[TaskRunner] Tick");
            events.push(RunnerEvent::Tick {
                task_name: self.current_task().name.clone(),
                remaining_secs: self.countdown,
            });
        }

        if self.countdown == 0 {
            self.phase = Phase::Completed;
            self.task_completed = true;
            self.status = Status::TaskComplete;

            tracing::info!(task = %self.current_task().name, "[TaskRunner] Task completed");
            events.push(RunnerEvent::TaskCompleted {
                task_index: self.task_index,
                task_name: self.current_task().name.clone(),
            });
        }

        events
    }

    /// Move a completed task into its cooldown window
    pub fn begin_cooldown(&mut self) -> Vec<RunnerEvent> {
        if self.phase != Phase::Completed {
            return Vec::new();
        }

        self.phase = Phase::Cooldown;
        vec![RunnerEvent::CooldownStarted {
            task_name: self.current_task().name.clone(),
        }]
    }

    /// Cooldown window elapsed: select the next task
    pub fn on_cooldown_elapsed(&mut self) -> Vec<RunnerEvent> {
        let mut events = Vec::new();
        self.check_index(&mut events);

        if self.phase != Phase::Cooldown {
            return events;
        }

        self.task_index = self.program.next_index(self.task_index);
        self.phase = Phase::Idle;
        self.countdown = 0;
        self.task_completed = false;
        self.status = Status::NextTaskReady;

        let task_name = self.current_task().name.clone();
        tracing::info!(
            task_index = self.task_index,
            task = %task_name,
            "[TaskRunner] Advanced to next task"
        );
        events.push(RunnerEvent::Advanced {
            task_index: self.task_index,
            task_name,
        });
        events
    }

    /// Recover from an out-of-bounds index by resetting to the first task
    fn check_index(&mut self, events: &mut Vec<RunnerEvent>) {
        let len = self.program.len();
        if self.task_index < len {
            return;
        }

        let err = SessionError::InvalidTaskIndex {
            index: self.task_index,
            len,
        };
        log_session_error(&err, "TaskRunner::check_index");

        events.push(RunnerEvent::IndexReset {
            invalid_index: self.task_index,
            len,
        });
        self.task_index = 0;
        self.phase = Phase::Idle;
        self.countdown = 0;
        self.task_completed = false;
    }

    #[cfg(test)]
    pub(crate) fn force_index_for_test(&mut self, index: usize) {
        self.task_index = index;
    }
}
