// TaskProgram - the validated, ordered exercise sequence
//
// The program is fixed for the lifetime of a session. Construction validates
// every task so the runner can rely on non-empty programs, positive
// durations and unique correlation names.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;
use crate::program::task::{vocabulary, TaskDefinition};

/// Model shared by the built-in tasks
pub const FACING_MODEL: &str = "facing-model";

/// Ordered, non-empty sequence of tasks
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgram {
    tasks: Arc<[TaskDefinition]>,
}

impl TaskProgram {
    /// Validate and wrap a task list
    ///
    /// # Errors
    /// Returns the first [`ProgramError`] found, checking tasks in order.
    pub fn new(tasks: Vec<TaskDefinition>) -> Result<Self, ProgramError> {
        if tasks.is_empty() {
            return Err(ProgramError::Empty);
        }

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in &tasks {
            Self::validate_task(task)?;
            if !seen.insert(task.name.as_str()) {
                return Err(ProgramError::DuplicateName {
                    task: task.name.clone(),
                });
            }
        }

        Ok(Self {
            tasks: tasks.into(),
        })
    }

    fn validate_task(task: &TaskDefinition) -> Result<(), ProgramError> {
        if task.duration_secs == 0 {
            return Err(ProgramError::InvalidDuration {
                task: task.name.clone(),
            });
        }

        if task.expected_conditions.is_empty() {
            return Err(ProgramError::NoConditions {
                task: task.name.clone(),
            });
        }

        for (index, label) in &task.expected_conditions {
            if task.label_at(*index) != Some(label.as_str()) {
                return Err(ProgramError::ConditionOutsideVocabulary {
                    task: task.name.clone(),
                    index: *index,
                    label: label.clone(),
                });
            }
        }

        Ok(())
    }

    /// Parse and validate a program from JSON (an array of tasks)
    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        let tasks: Vec<TaskDefinition> = serde_json::from_str(json)?;
        Self::new(tasks)
    }

    /// Load a program file from disk
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProgramError> {
        let contents = fs::read_to_string(&path).map_err(|err| ProgramError::Parse {
            reason: format!("reading {}: {}", path.as_ref().display(), err),
        })?;
        Self::from_json(&contents)
    }

    /// The four-step head mobility routine shipped with the app
    pub fn default_program() -> Self {
        let facing = vocabulary([
            (0, "front"),
            (1, "left"),
            (2, "right"),
            (3, "tilt"),
            (4, "turn"),
        ]);
        let vertical = vocabulary([(5, "down"), (6, "unknown"), (7, "top")]);

        let tasks = vec![
            TaskDefinition::new(
                "Turn head left",
                vocabulary([(1, "left"), (4, "turn")]),
                4,
                FACING_MODEL,
                facing.clone(),
            )
            .with_icon("arrowshape.left.fill")
            .with_multiplier("front", 1.4),
            TaskDefinition::new(
                "Face forward",
                vocabulary([(0, "front")]),
                4,
                FACING_MODEL,
                facing.clone(),
            )
            .with_icon("face.smiling.inverse")
            .with_multiplier("front", 1.5),
            TaskDefinition::new(
                "Turn head right",
                vocabulary([(2, "right"), (4, "turn")]),
                4,
                FACING_MODEL,
                facing,
            )
            .with_icon("arrowshape.right.fill")
            .with_multiplier("front", 1.3),
            TaskDefinition::new(
                "Look up",
                vocabulary([(7, "top")]),
                4,
                FACING_MODEL,
                vertical,
            )
            .with_icon("arrow.up.circle.fill")
            .with_multiplier("top", 1.4),
        ];

        Self {
            tasks: tasks.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always false for a constructed program; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TaskDefinition> {
        self.tasks.get(index)
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    /// Index following `index`, wrapping to 0 after the last task
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.tasks.len()
    }

    pub fn to_json_pretty(&self) -> Result<String, ProgramError> {
        Ok(serde_json::to_string_pretty(self.tasks())?)
    }
}

impl Default for TaskProgram {
    fn default() -> Self {
        Self::default_program()
    }
}

impl Serialize for TaskProgram {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.tasks().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskProgram {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tasks = Vec::<TaskDefinition>::deserialize(deserializer)?;
        TaskProgram::new(tasks).map_err(serde::de::Error::custom)
    }
}
