//! Session: the single owner of a [`TaskRunner`] and everything that drives it.
//!
//! A session is a tokio task running one `select!` loop. Frames, condition
//! reports and the auto-processing toggle arrive as typed commands; countdown
//! ticks, auto-process ticks, the cooldown timer and classification replies
//! are all timers or channels owned by the same loop, so the runner is never
//! touched from two places at once.
//!
//! Callers hold a [`SessionHandle`]. Snapshots are published on a `watch`
//! channel after every transition and a [`SessionEvent`] stream is available
//! over `broadcast`.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::audio::{CuePlayer, LoggingCuePlayer};
use crate::classification::{ClassificationAdapter, Frame};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::evaluator::ConditionEvent;
use crate::program::TaskProgram;
use crate::runner::TaskRunner;
use crate::telemetry::{self, TelemetryHub};

mod event_loop;
mod snapshot;

pub use snapshot::{SessionEvent, SessionSnapshot};

use event_loop::SessionLoop;

#[cfg(test)]
mod tests;

/// Commands accepted by the session loop
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Replace the latest frame; `None` clears it
    SubmitFrame(Option<Frame>),
    SetAutoProcessing(bool),
    ReportCondition(ConditionEvent),
    Shutdown,
}

/// Configures and starts a session
pub struct SessionBuilder {
    program: TaskProgram,
    adapter: Arc<dyn ClassificationAdapter>,
    config: SessionConfig,
    cues: Arc<dyn CuePlayer>,
    telemetry: Option<Arc<TelemetryHub>>,
}

impl SessionBuilder {
    pub fn new(program: TaskProgram, adapter: Arc<dyn ClassificationAdapter>) -> Self {
        Self {
            program,
            adapter,
            config: SessionConfig::default(),
            cues: Arc::new(LoggingCuePlayer),
            telemetry: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cue_player(mut self, cues: Arc<dyn CuePlayer>) -> Self {
        self.cues = cues;
        self
    }

    /// Report metrics to `telemetry` instead of the global hub
    pub fn telemetry(mut self, telemetry: Arc<TelemetryHub>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Spawn the session loop on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn(self) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (events_tx, _) = broadcast::channel(self.config.event_buffer.max(1));

        let runner = TaskRunner::new(self.program);
        let initial = SessionSnapshot::capture(&runner, self.config.auto_processing_enabled, false);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let telemetry = self.telemetry.unwrap_or_else(telemetry::hub);
        let session = SessionLoop::new(
            runner,
            self.config,
            self.adapter,
            self.cues,
            telemetry,
            command_rx,
            snapshot_tx,
            events_tx.clone(),
        );

        tokio::spawn(session.run());

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: events_tx,
        }
    }
}

/// Cloneable handle to a running session
///
/// The loop stops on [`SessionHandle::shutdown`] or once every handle has
/// been dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Hand the latest camera frame to the session
    ///
    /// Never waits: a frame that cannot be queued is rejected with
    /// `ChannelFull`, the next frame will replace it anyway.
    pub fn submit_frame(&self, frame: Option<Frame>) -> Result<(), SessionError> {
        self.commands
            .try_send(SessionCommand::SubmitFrame(frame))
            .map_err(map_try_send_error)
    }

    pub async fn set_auto_processing(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(SessionCommand::SetAutoProcessing(enabled)).await
    }

    /// Feed a condition decision straight to the runner, bypassing the adapter
    pub async fn report_condition(&self, event: ConditionEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::ReportCondition(event)).await
    }

    /// Stop the loop and wait until it has torn down
    ///
    /// Any in-flight classification is aborted. Further commands return
    /// `SessionError::Closed`.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await?;
        self.commands.closed().await;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Event stream that skips over lagged gaps
    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

fn map_try_send_error(err: TrySendError<SessionCommand>) -> SessionError {
    match err {
        TrySendError::Full(_) => SessionError::ChannelFull,
        TrySendError::Closed(_) => SessionError::Closed,
    }
}
