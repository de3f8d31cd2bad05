// Session error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Session error code constants
///
/// Error code range: 4001-4003
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// The session has been torn down
    pub const CLOSED: i32 = 4001;

    /// Task index fell outside the program bounds
    pub const INVALID_TASK_INDEX: i32 = 4002;

    /// The command queue is saturated
    pub const CHANNEL_FULL: i32 = 4003;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        error_code = err.code(),
        component = "Session",
        "Session error in {}: {}",
        context,
        err.message()
    );
}

/// Session-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Session event loop is no longer running
    Closed,

    /// Internal invariant violation, recovered by resetting to task 0
    InvalidTaskIndex { index: usize, len: usize },

    /// Command channel has no free capacity
    ChannelFull,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Closed => SessionErrorCodes::CLOSED,
            SessionError::InvalidTaskIndex { .. } => SessionErrorCodes::INVALID_TASK_INDEX,
            SessionError::ChannelFull => SessionErrorCodes::CHANNEL_FULL,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Closed => "Session already shut down".to_string(),
            SessionError::InvalidTaskIndex { index, len } => {
                format!("Task index {} out of bounds for program of {} tasks", index, len)
            }
            SessionError::ChannelFull => "Session command queue saturated".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        assert_eq!(SessionError::Closed.code(), 4001);
        assert_eq!(
            SessionError::InvalidTaskIndex { index: 7, len: 4 }.code(),
            4002
        );
        assert_eq!(SessionError::ChannelFull.code(), 4003);
    }

    #[test]
    fn test_invalid_index_message() {
        let err = SessionError::InvalidTaskIndex { index: 7, len: 4 };
        assert!(err.message().contains("7"));
        assert!(err.message().contains("4 tasks"));
    }
}
