//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes classification latency, classification failures,
//! stale condition events and session lifecycle events into a bounded history
//! plus an async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

pub mod events;

pub use events::{DiagnosticError, LifecyclePhase, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<Arc<TelemetryHub>> = Lazy::new(|| Arc::new(TelemetryHub::default()));

/// Access the global telemetry hub.
pub fn hub() -> Arc<TelemetryHub> {
    Arc::clone(&HUB)
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self
                .history
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Latency tracker maintains a rolling window to compute avg/max latency.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus the latency window.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<LatencyTracker>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, latency_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    /// Record the round-trip time of a successful classification request
    pub fn record_classification_latency(&self, latency_ms: f32) {
        let (avg, max, count) = {
            let mut tracker = self
                .latency
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tracker.observe(latency_ms)
        };

        self.collector.publish(MetricEvent::Latency {
            avg_ms: avg,
            max_ms: max,
            sample_count: count,
        });
    }

    pub fn record_classification_failure(&self, task: &str, code: i32) {
        self.collector.publish(MetricEvent::ClassificationFailed {
            task: task.to_string(),
            code,
        });
    }

    pub fn record_stale_event(&self, current_task: &str, event_task: &str) {
        self.collector.publish(MetricEvent::StaleEventDiscarded {
            current_task: current_task.to_string(),
            event_task: event_task.to_string(),
        });
    }

    pub fn record_task_completed(&self, task: &str, task_index: usize) {
        self.collector.publish(MetricEvent::TaskCompleted {
            task: task.to_string(),
            task_index,
        });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_error(&self, code: DiagnosticError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Latency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::ClassificationFailed {
            task: "Look up".to_string(),
            code: 3002,
        });
        collector.publish(MetricEvent::TaskCompleted {
            task: "Look up".to_string(),
            task_index: 3,
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Latency { avg_ms, .. } if (avg_ms - 1.0).abs() < f32::EPSILON
        ));
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::TaskCompleted { task_index: 3, .. }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for code in [3001, 3002, 3003] {
            collector.publish(MetricEvent::ClassificationFailed {
                task: "Face forward".to_string(),
                code,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::ClassificationFailed { code: 3002, .. }
        ));
    }

    #[test]
    fn hub_tracks_rolling_latency() {
        let hub = TelemetryHub::new(8, 8, 2);
        hub.record_classification_latency(10.0);
        hub.record_classification_latency(30.0);
        hub.record_classification_latency(50.0);

        let snapshot = hub.snapshot();
        let last = snapshot.recent.last().cloned();
        match last {
            Some(MetricEvent::Latency {
                avg_ms,
                max_ms,
                sample_count,
            }) => {
                assert_eq!(sample_count, 2);
                assert!((avg_ms - 40.0).abs() < f32::EPSILON);
                assert!((max_ms - 50.0).abs() < f32::EPSILON);
            }
            other => panic!("Expected Latency event, got {:?}", other),
        }
    }

    #[test]
    fn hub_records_stale_events() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_stale_event("Turn head left", "Look up");

        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot.recent,
            vec![MetricEvent::StaleEventDiscarded {
                current_task: "Turn head left".to_string(),
                event_task: "Look up".to_string(),
            }]
        );
    }

    #[test]
    fn subscribers_receive_published_events() {
        let hub = TelemetryHub::new(8, 8, 4);
        let mut rx = hub.collector().subscribe();
        hub.record_task_completed("Face forward", 1);

        assert_eq!(
            rx.try_recv().ok(),
            Some(MetricEvent::TaskCompleted {
                task: "Face forward".to_string(),
                task_index: 1,
            })
        );
    }

    #[test]
    fn metric_event_serializes_with_tag() {
        let json = serde_json::to_value(MetricEvent::Lifecycle {
            phase: LifecyclePhase::SessionStarted,
            timestamp_ms: 5,
        })
        .unwrap();
        assert_eq!(json["type"], "lifecycle");
        assert_eq!(json["payload"]["phase"], "session_started");
    }
}
