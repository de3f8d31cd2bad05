// Classification error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::warn;

/// Classification error code constants
///
/// Error code range: 3001-3004
pub struct ClassificationErrorCodes {}

impl ClassificationErrorCodes {
    /// The adapter reported a failure while running inference
    pub const ADAPTER_FAILED: i32 = 3001;

    /// The adapter did not answer within the configured window
    pub const TIMEOUT: i32 = 3002;

    /// Scores could not be resolved to a single label
    pub const AMBIGUOUS: i32 = 3003;

    /// The requested model is not known to the adapter
    pub const UNKNOWN_MODEL: i32 = 3004;
}

/// Log a classification error with structured context
///
/// Classification failures are absorbed by the session, so they are logged
/// at warn level rather than error.
pub fn log_classification_error(err: &ClassificationError, context: &str) {
    warn!(
        error_code = err.code(),
        component = "ClassificationAdapter",
        "Classification error in {}: {}",
        context,
        err.message()
    );
}

/// Classification-related errors
///
/// None of these are fatal. The worst visible effect is a tick without
/// countdown progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationError {
    /// Inference failed inside the adapter
    AdapterFailed { reason: String },

    /// No answer within the timeout window
    Timeout { timeout_ms: u64 },

    /// Weighted scores did not single out one label
    Ambiguous { model: String },

    /// Model selector not recognised
    UnknownModel { model: String },
}

impl ErrorCode for ClassificationError {
    fn code(&self) -> i32 {
        match self {
            ClassificationError::AdapterFailed { .. } => ClassificationErrorCodes::ADAPTER_FAILED,
            ClassificationError::Timeout { .. } => ClassificationErrorCodes::TIMEOUT,
            ClassificationError::Ambiguous { .. } => ClassificationErrorCodes::AMBIGUOUS,
            ClassificationError::UnknownModel { .. } => ClassificationErrorCodes::UNKNOWN_MODEL,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassificationError::AdapterFailed { reason } => {
                format!("Classification failed: {}", reason)
            }
            ClassificationError::Timeout { timeout_ms } => {
                format!("Classification timed out after {} ms", timeout_ms)
            }
            ClassificationError::Ambiguous { model } => {
                format!("No single label resolved for model {}", model)
            }
            ClassificationError::UnknownModel { model } => {
                format!("Unknown classification model: {}", model)
            }
        }
    }
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassificationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassificationError {}
