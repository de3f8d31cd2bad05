//! Discrete audio cues emitted by the session.
//!
//! Exactly two cues exist: a tick once per countdown decrement and a success
//! sound once per completed task.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// System sound id the mobile app plays for the countdown tick
const TICK_SYSTEM_SOUND: u32 = 1103;

/// System sound id the mobile app plays on task completion
const SUCCESS_SYSTEM_SOUND: u32 = 1057;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCue {
    Tick,
    Success,
}

impl AudioCue {
    /// Platform system sound conventionally used for this cue
    pub fn system_sound_id(self) -> u32 {
        match self {
            AudioCue::Tick => TICK_SYSTEM_SOUND,
            AudioCue::Success => SUCCESS_SYSTEM_SOUND,
        }
    }
}

/// Audio collaborator
///
/// Called from the session event loop, so implementations must not block.
pub trait CuePlayer: Send + Sync + 'static {
    fn play(&self, cue: AudioCue);
}

/// Player that only logs, used by the CLI and headless runs
#[derive(Debug, Default)]
pub struct LoggingCuePlayer;

impl CuePlayer for LoggingCuePlayer {
    fn play(&self, cue: AudioCue) {
        tracing::debug!(?cue, sound_id = cue.system_sound_id(), "[Audio] cue");
    }
}

/// Player that remembers every cue in order
#[derive(Debug, Default)]
pub struct RecordingCuePlayer {
    played: Mutex<Vec<AudioCue>>,
}

impl RecordingCuePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AudioCue> {
        self.played
            .lock()
            .map(|cues| cues.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }

    pub fn count(&self, cue: AudioCue) -> usize {
        self.played().into_iter().filter(|c| *c == cue).count()
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn play(&self, cue: AudioCue) {
        match self.played.lock() {
            Ok(mut cues) => cues.push(cue),
            Err(err) => err.into_inner().push(cue),
        }
    }
}
