use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use crate::session::{SessionEvent, SessionHandle};

pub type SessionEventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// SSE event name for a session event
fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::ClassificationSubmitted { .. } => "classification_submitted",
        SessionEvent::ClassificationFinished { .. } => "classification_finished",
        SessionEvent::Condition { .. } => "condition",
        SessionEvent::Runner { .. } => "runner",
        SessionEvent::AutoProcessingChanged { .. } => "auto_processing",
    }
}

/// Build a Server-Sent Events stream of session events.
pub fn session_events(handle: &SessionHandle) -> SessionEventStream {
    let stream = handle.event_stream().filter_map(|event| async move {
        match serde_json::to_string(&event) {
            Ok(payload) => Some(Ok(Event::default().event(event_name(&event)).data(payload))),
            Err(err) => {
                tracing::warn!(error = %err, "[HTTP] Failed to encode session event");
                None
            }
        }
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ConditionEvent;

    #[test]
    fn event_names_follow_variants() {
        assert_eq!(
            event_name(&SessionEvent::AutoProcessingChanged { enabled: true }),
            "auto_processing"
        );
        assert_eq!(
            event_name(&SessionEvent::Condition {
                event: ConditionEvent::met("Look up")
            }),
            "condition"
        );
    }
}
