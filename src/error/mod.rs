// Error types for the neck trainer core
//
// This module defines custom error types for classification, session and
// program operations, providing structured error handling with numeric codes
// that presentation layers can switch on.

mod classification;
mod program;
mod session;

pub use classification::{log_classification_error, ClassificationError, ClassificationErrorCodes};
pub use program::{ProgramError, ProgramErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
