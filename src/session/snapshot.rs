// Presentation-facing snapshot and event types

use serde::{Deserialize, Serialize};

use crate::classification::ClassificationOutcome;
use crate::evaluator::ConditionEvent;
use crate::runner::{Phase, RunnerEvent, TaskRunner};

/// Read-only view of the session pushed after every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub task_index: usize,
    pub task_name: String,
    pub task_icon: String,
    pub phase: Phase,
    pub countdown: u32,
    pub task_completed: bool,
    pub auto_processing_enabled: bool,
    pub in_flight: bool,
    pub status_text: String,
    /// Current task and the one after it, never wrapping past the end
    pub upcoming: Vec<String>,
}

impl SessionSnapshot {
    pub(crate) fn capture(
        runner: &TaskRunner,
        auto_processing_enabled: bool,
        in_flight: bool,
    ) -> Self {
        let task = runner.current_task();
        Self {
            task_index: runner.task_index(),
            task_name: task.name.clone(),
            task_icon: task.icon.clone(),
            phase: runner.phase(),
            countdown: runner.countdown(),
            task_completed: runner.task_completed(),
            auto_processing_enabled,
            in_flight,
            status_text: runner.status().to_string(),
            upcoming: runner.upcoming().iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Everything the session reports on its event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// A frame was handed to the adapter
    ClassificationSubmitted { request_id: u64, task_name: String },
    /// The adapter answered (or failed, or timed out)
    ClassificationFinished {
        request_id: u64,
        task_name: String,
        outcome: ClassificationOutcome,
    },
    /// Condition decision forwarded to the runner
    Condition { event: ConditionEvent },
    Runner { event: RunnerEvent },
    AutoProcessingChanged { enabled: bool },
}
