//! Condition evaluation: does the latest label map satisfy the current task?
//!
//! Pure name comparison. Confidence weighting has already happened in
//! [`crate::classification::weighting`] by the time a map reaches here.

use serde::{Deserialize, Serialize};

use crate::classification::LabelMap;
use crate::program::{LabelVocabulary, TaskDefinition};

/// Result of evaluating a task's expected conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Met,
    NotMet,
}

impl Condition {
    pub fn is_met(self) -> bool {
        matches!(self, Condition::Met)
    }
}

/// Condition decision tagged with the task it was computed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionEvent {
    pub task_name: String,
    pub condition: Condition,
}

impl ConditionEvent {
    pub fn met(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            condition: Condition::Met,
        }
    }

    pub fn not_met(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            condition: Condition::NotMet,
        }
    }
}

/// Stateless evaluator of expected-condition tables
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// MET when any `(index, name)` pair of `expected` appears in `observed`
    pub fn evaluate(expected: &LabelVocabulary, observed: &LabelMap) -> Condition {
        let matched = expected
            .iter()
            .any(|(index, name)| observed.get(index) == Some(name));

        if matched {
            Condition::Met
        } else {
            Condition::NotMet
        }
    }

    pub fn evaluate_task(task: &TaskDefinition, observed: &LabelMap) -> Condition {
        Self::evaluate(&task.expected_conditions, observed)
    }
}
