//! Configuration management for session timing and policies
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling tuning of tick periods, the cooldown window and the
//! classification timeout without recompilation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;
use crate::program::TaskProgram;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionConfig,
    /// Program file to load instead of the built-in routine
    #[serde(default)]
    pub program_path: Option<PathBuf>,
}

/// What a failed or ambiguous classification means for the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Emit no condition event; the current phase is left unchanged
    #[default]
    Ignore,
    /// Emit NOT_MET for the request's task, dropping a running countdown
    TreatAsNotMet,
}

/// Session timing and gating parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Countdown decrement period
    pub countdown_tick_ms: u64,
    /// Auto-process gate evaluation period
    pub auto_process_interval_ms: u64,
    /// Delay between task completion and the next task
    pub cooldown_ms: u64,
    /// Upper bound on one classification request
    pub classification_timeout_ms: u64,
    /// Initial state of the auto-processing toggle
    pub auto_processing_enabled: bool,
    pub failure_policy: FailurePolicy,
    /// Capacity of the session event broadcast channel
    pub event_buffer: usize,
    /// Capacity of the session command queue
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_tick_ms: 1000,
            auto_process_interval_ms: 1000,
            cooldown_ms: 2000,
            classification_timeout_ms: 5000,
            auto_processing_enabled: false,
            failure_policy: FailurePolicy::Ignore,
            event_buffer: 128,
            command_buffer: 64,
        }
    }
}

impl SessionConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }

    pub fn auto_process_interval(&self) -> Duration {
        Duration::from_millis(self.auto_process_interval_ms.max(1))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn classification_timeout(&self) -> Duration {
        Duration::from_millis(self.classification_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the conventional assets location
    pub fn load() -> Self {
        Self::load_from_file("assets/session_config.json")
    }

    /// Program selected by this configuration
    pub fn program(&self) -> Result<TaskProgram, ProgramError> {
        match &self.program_path {
            Some(path) => TaskProgram::load_from_file(path),
            None => Ok(TaskProgram::default_program()),
        }
    }
}
