// Program validation errors

use crate::error::ErrorCode;
use std::fmt;

/// Program error code constants
///
/// Error code range: 5001-5006
pub struct ProgramErrorCodes {}

impl ProgramErrorCodes {
    pub const EMPTY: i32 = 5001;
    pub const INVALID_DURATION: i32 = 5002;
    pub const DUPLICATE_NAME: i32 = 5003;
    pub const NO_CONDITIONS: i32 = 5004;
    pub const CONDITION_OUTSIDE_VOCABULARY: i32 = 5005;
    pub const PARSE: i32 = 5006;
}

/// Errors raised while building a [`crate::program::TaskProgram`]
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramError {
    /// A program needs at least one task
    Empty,

    /// Hold duration must be strictly positive
    InvalidDuration { task: String },

    /// Task names double as correlation keys and must be unique
    DuplicateName { task: String },

    /// A task without expected conditions can never be met
    NoConditions { task: String },

    /// Expected condition does not agree with the task vocabulary
    ConditionOutsideVocabulary {
        task: String,
        index: usize,
        label: String,
    },

    /// Program JSON could not be parsed
    Parse { reason: String },
}

impl ErrorCode for ProgramError {
    fn code(&self) -> i32 {
        match self {
            ProgramError::Empty => ProgramErrorCodes::EMPTY,
            ProgramError::InvalidDuration { .. } => ProgramErrorCodes::INVALID_DURATION,
            ProgramError::DuplicateName { .. } => ProgramErrorCodes::DUPLICATE_NAME,
            ProgramError::NoConditions { .. } => ProgramErrorCodes::NO_CONDITIONS,
            ProgramError::ConditionOutsideVocabulary { .. } => {
                ProgramErrorCodes::CONDITION_OUTSIDE_VOCABULARY
            }
            ProgramError::Parse { .. } => ProgramErrorCodes::PARSE,
        }
    }

    fn message(&self) -> String {
        match self {
            ProgramError::Empty => "Program contains no tasks".to_string(),
            ProgramError::InvalidDuration { task } => {
                format!("Task '{}' must have a duration of at least 1 second", task)
            }
            ProgramError::DuplicateName { task } => {
                format!("Task name '{}' appears more than once", task)
            }
            ProgramError::NoConditions { task } => {
                format!("Task '{}' has no expected conditions", task)
            }
            ProgramError::ConditionOutsideVocabulary { task, index, label } => format!(
                "Task '{}' expects '{}' at index {} which its label map does not define",
                task, label, index
            ),
            ProgramError::Parse { reason } => format!("Invalid program JSON: {}", reason),
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProgramError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ProgramError {}

impl From<serde_json::Error> for ProgramError {
    fn from(err: serde_json::Error) -> Self {
        ProgramError::Parse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_error_codes() {
        assert_eq!(ProgramError::Empty.code(), 5001);
        assert_eq!(
            ProgramError::InvalidDuration {
                task: "a".to_string()
            }
            .code(),
            5002
        );
        assert_eq!(
            ProgramError::ConditionOutsideVocabulary {
                task: "a".to_string(),
                index: 9,
                label: "left".to_string()
            }
            .code(),
            5005
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let err: ProgramError = json_err.into();

        match err {
            ProgramError::Parse { reason } => assert!(!reason.is_empty()),
            other => panic!("Expected Parse variant, got {:?}", other),
        }
    }
}
