// Audio cue module
//
// Audio playback is an external collaborator. The session only decides when
// a cue fires; implementations of CuePlayer decide how it sounds.

pub mod cues;

pub use cues::{AudioCue, CuePlayer, LoggingCuePlayer, RecordingCuePlayer};
