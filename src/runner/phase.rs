// Phase and event types for the task runner

use serde::{Deserialize, Serialize};

use crate::audio::AudioCue;

/// Runner phase
///
/// The runner starts in `Idle` and never terminates; after the last task
/// the program loops back to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the current task's condition
    Idle,
    /// Condition held, countdown running
    CountingDown,
    /// Countdown finished, cooldown not yet armed
    Completed,
    /// Fixed delay before the next task
    Cooldown,
}

impl Phase {
    /// Whether the auto-process gate may submit frames in this phase
    pub fn admits_frames(self) -> bool {
        matches!(self, Phase::Idle | Phase::CountingDown)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::CountingDown => "COUNTING DOWN",
            Phase::Completed => "COMPLETED",
            Phase::Cooldown => "COOLDOWN",
        }
    }
}

/// Human-readable status line shown next to the task icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Preparing,
    Countdown { remaining_secs: u32 },
    TaskComplete,
    ConditionNotMet,
    NextTaskReady,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Preparing => write!(f, "Preparing..."),
            Status::Countdown { remaining_secs } => write!(f, "Countdown: {}s", remaining_secs),
            Status::TaskComplete => write!(f, "Task complete!"),
            Status::ConditionNotMet => write!(f, "Condition not met"),
            Status::NextTaskReady => write!(f, "Ready for next task"),
        }
    }
}

/// Observable outcome of a runner transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerEvent {
    CountdownStarted {
        task_index: usize,
        task_name: String,
        duration_secs: u32,
    },
    /// Countdown interrupted; partial progress is discarded
    CountdownReset {
        task_index: usize,
        task_name: String,
        discarded_secs: u32,
    },
    Tick {
        task_name: String,
        remaining_secs: u32,
    },
    TaskCompleted {
        task_index: usize,
        task_name: String,
    },
    CooldownStarted {
        task_name: String,
    },
    Advanced {
        task_index: usize,
        task_name: String,
    },
    /// Condition event for a task other than the current one
    StaleEventDiscarded {
        current_task: String,
        event_task: String,
    },
    /// Out-of-bounds task index recovered by resetting to the first task
    IndexReset {
        invalid_index: usize,
        len: usize,
    },
}

impl RunnerEvent {
    /// Audio cue this event drives, if any
    pub fn cue(&self) -> Option<AudioCue> {
        match self {
            RunnerEvent::Tick { .. } => Some(AudioCue::Tick),
            RunnerEvent::TaskCompleted { .. } => Some(AudioCue::Success),
            _ => None,
        }
    }
}
