// Neck Trainer Core - guided head-movement exercise sessions
// Task sequencing, condition evaluation and countdown timing around an
// external pose classifier

// Module declarations
pub mod audio;
pub mod classification;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod program;
pub mod runner;
pub mod session;
pub mod simulation;
pub mod telemetry;

#[cfg(feature = "debug_http")]
pub mod http;

// Re-exports for convenience
pub use audio::{AudioCue, CuePlayer};
pub use classification::{ClassificationAdapter, ClassificationRequest, Frame, LabelMap};
pub use config::{AppConfig, FailurePolicy, SessionConfig};
pub use error::{ClassificationError, ErrorCode, ProgramError, SessionError};
pub use evaluator::{Condition, ConditionEvaluator, ConditionEvent};
pub use program::{TaskDefinition, TaskProgram};
pub use runner::{Phase, RunnerEvent, Status, TaskRunner};
pub use session::{SessionBuilder, SessionEvent, SessionHandle, SessionSnapshot};
