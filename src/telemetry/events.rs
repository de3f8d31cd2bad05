//! Core telemetry event types describing session diagnostics exposed to the
//! CLI and the debug HTTP surface.

use serde::{Deserialize, Serialize};

/// High-level session lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    SessionStarted,
    SessionStopped,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    InvalidTaskIndex,
    LateResultDropped,
    Unknown,
}

/// Metric events covering classification latency, failures, filtering and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    ClassificationFailed {
        task: String,
        code: i32,
    },
    StaleEventDiscarded {
        current_task: String,
        event_task: String,
    },
    TaskCompleted {
        task: String,
        task_index: usize,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
