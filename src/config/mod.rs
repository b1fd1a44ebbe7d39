// src/config/mod.rs
//! Configuration management: board selection, session layout, processing
//! parameters and maze actuation

pub mod constants;
pub mod loader;
pub mod processing_config;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};
pub use processing_config::*;

use serde::{Deserialize, Serialize};
use crate::hal::{BoardDescriptor, BoardId};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub board: BoardSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub actuation: ActuationConfig,
}

/// Which acquisition board to open and how
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BoardSettings {
    #[serde(default = "defaults::board_id")]
    pub board_id: BoardId,

    #[serde(default)]
    pub serial_port: String,

    #[serde(default)]
    pub streamer_params: String,

    #[serde(default = "defaults::stream_buffer_size")]
    pub stream_buffer_size: usize,

    #[serde(default = "defaults::timeout_s")]
    pub timeout_s: u32,
}

/// Operating mode of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Independent pipelines, one per player
    Game,
    /// One combined pipeline over every active channel
    Analysis,
}

/// Session layout: who plays on which channel, and the analysis window
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionSettings {
    #[serde(default = "defaults::active_channels")]
    pub active_channels: Vec<usize>,

    #[serde(default = "defaults::game_mode")]
    pub game_mode: GameMode,

    #[serde(default = "defaults::num_players")]
    pub num_players: usize,

    #[serde(default = "defaults::window_size_seconds")]
    pub window_size_seconds: usize,

    #[serde(default = "defaults::update_interval_ms")]
    pub update_interval_ms: u64,
}

/// Servo angles for one maze axis
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ServoAngles {
    pub left_deg: u8,
    pub right_deg: u8,
}

/// Maze actuation configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ActuationConfig {
    #[serde(default = "defaults::inner_servo")]
    pub inner_servo: ServoAngles,

    #[serde(default = "defaults::outer_servo")]
    pub outer_servo: ServoAngles,

    #[serde(default = "defaults::command_queue_size")]
    pub command_queue_size: usize,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use crate::config::{GameMode, ServoAngles};
    use crate::hal::BoardId;

    pub fn board_id() -> BoardId { BoardId::Synthetic }
    pub fn stream_buffer_size() -> usize { board::DEFAULT_STREAM_BUFFER_SIZE }
    pub fn timeout_s() -> u32 { board::DEFAULT_TIMEOUT_S }

    pub fn active_channels() -> Vec<usize> { session::DEFAULT_ACTIVE_CHANNELS.to_vec() }
    pub fn game_mode() -> GameMode { GameMode::Game }
    pub fn num_players() -> usize { session::DEFAULT_NUM_PLAYERS }
    pub fn window_size_seconds() -> usize { session::DEFAULT_WINDOW_SIZE_SECONDS }
    pub fn update_interval_ms() -> u64 { session::DEFAULT_UPDATE_INTERVAL_MS }

    pub fn inner_servo() -> ServoAngles {
        ServoAngles { left_deg: actuation::INNER_SERVO_LEFT_DEG, right_deg: actuation::INNER_SERVO_RIGHT_DEG }
    }
    pub fn outer_servo() -> ServoAngles {
        ServoAngles { left_deg: actuation::OUTER_SERVO_LEFT_DEG, right_deg: actuation::OUTER_SERVO_RIGHT_DEG }
    }
    pub fn command_queue_size() -> usize { actuation::DEFAULT_COMMAND_QUEUE_SIZE }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            board_id: defaults::board_id(),
            serial_port: String::new(),
            streamer_params: String::new(),
            stream_buffer_size: defaults::stream_buffer_size(),
            timeout_s: defaults::timeout_s(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            active_channels: defaults::active_channels(),
            game_mode: defaults::game_mode(),
            num_players: defaults::num_players(),
            window_size_seconds: defaults::window_size_seconds(),
            update_interval_ms: defaults::update_interval_ms(),
        }
    }
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            inner_servo: defaults::inner_servo(),
            outer_servo: defaults::outer_servo(),
            command_queue_size: defaults::command_queue_size(),
        }
    }
}

impl SessionSettings {
    /// Channel groups feeding each pipeline.
    ///
    /// Game mode deals active channels round-robin to players, so player `i`
    /// always owns `active_channels[i]` and any extra channels are shared out
    /// in order. Analysis mode returns a single group with every active channel.
    pub fn pipeline_channels(&self) -> Vec<Vec<usize>> {
        match self.game_mode {
            GameMode::Analysis => vec![self.active_channels.clone()],
            GameMode::Game => {
                let players = self.num_players.max(1);
                let mut groups = vec![Vec::new(); players];
                for (i, &channel) in self.active_channels.iter().enumerate() {
                    groups[i % players].push(channel);
                }
                groups
            }
        }
    }

    /// Number of samples held by the channel window
    pub fn window_samples(&self, sampling_rate_hz: u32) -> usize {
        self.window_size_seconds * sampling_rate_hz as usize
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.num_players < session::MIN_PLAYERS || self.num_players > session::MAX_PLAYERS {
            errors.push(format!(
                "num_players must be between {} and {}, got {}",
                session::MIN_PLAYERS, session::MAX_PLAYERS, self.num_players
            ));
        }
        if self.window_size_seconds == 0 || self.window_size_seconds > session::MAX_WINDOW_SIZE_SECONDS {
            errors.push(format!(
                "window_size_seconds must be between 1 and {}, got {}",
                session::MAX_WINDOW_SIZE_SECONDS, self.window_size_seconds
            ));
        }
        if self.update_interval_ms > session::MAX_UPDATE_INTERVAL_MS {
            errors.push(format!(
                "update_interval_ms must be at most {}, got {}",
                session::MAX_UPDATE_INTERVAL_MS, self.update_interval_ms
            ));
        }
        if self.active_channels.is_empty() {
            errors.push("at least one active channel is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for channel in &self.active_channels {
            if !seen.insert(*channel) {
                errors.push(format!("channel {} is assigned more than once", channel));
            }
        }
        if self.game_mode == GameMode::Game && self.active_channels.len() < self.num_players {
            errors.push(format!(
                "game mode needs one channel per player: {} players, {} channels",
                self.num_players,
                self.active_channels.len()
            ));
        }
    }
}

impl SystemConfig {
    /// Validate settings that do not depend on the opened board
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        self.session.validate_into(&mut errors);
        if let Err(reason) = validate_processing_config(&self.processing) {
            errors.push(reason);
        }
        if self.actuation.command_queue_size == 0 {
            errors.push("command_queue_size must be greater than 0".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Validate settings against the metadata of an opened board
    pub fn validate_for_board(&self, descriptor: &BoardDescriptor) -> Result<(), Vec<String>> {
        let mut errors = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        for channel in &self.session.active_channels {
            if !descriptor.eeg_rows.contains(channel) {
                errors.push(format!(
                    "channel {} is not an EEG channel of {} (available: {:?})",
                    channel, descriptor.name, descriptor.eeg_rows
                ));
            }
        }

        let nyquist = descriptor.sampling_rate_hz as f64 / 2.0;
        let filter = &self.processing.filter;
        if filter.enabled {
            if filter.bandpass_high_hz >= nyquist {
                errors.push(format!(
                    "band-pass high cutoff ({} Hz) must be below Nyquist ({} Hz)",
                    filter.bandpass_high_hz, nyquist
                ));
            }
            if filter.mains_frequency_hz >= nyquist {
                errors.push(format!(
                    "mains frequency ({} Hz) must be below Nyquist ({} Hz)",
                    filter.mains_frequency_hz, nyquist
                ));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SystemConfig::default();
        assert_eq!(config.session.window_size_seconds, session::DEFAULT_WINDOW_SIZE_SECONDS);
        assert_eq!(config.session.active_channels, vec![1, 2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SystemConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SystemConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SystemConfig = toml::from_str(
            r#"
[session]
num_players = 1
game_mode = "analysis"
"#,
        )
        .unwrap();
        assert_eq!(config.session.num_players, 1);
        assert_eq!(config.session.game_mode, GameMode::Analysis);
        assert_eq!(config.session.window_size_seconds, 5);
        assert_eq!(config.board.board_id, BoardId::Synthetic);
    }

    #[test]
    fn test_player_count_validation() {
        let mut config = SystemConfig::default();
        config.session.num_players = 5;
        config.session.active_channels = vec![1, 2, 3, 4, 5];
        assert!(config.validate().is_err());

        config.session.num_players = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_game_mode_needs_channel_per_player() {
        let mut config = SystemConfig::default();
        config.session.num_players = 3;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("one channel per player")));
    }

    #[test]
    fn test_duplicate_channels_rejected() {
        let mut config = SystemConfig::default();
        config.session.active_channels = vec![1, 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_channels() {
        let mut settings = SessionSettings::default();
        assert_eq!(settings.pipeline_channels(), vec![vec![1], vec![2]]);

        settings.active_channels = vec![1, 2, 3, 4];
        assert_eq!(settings.pipeline_channels(), vec![vec![1, 3], vec![2, 4]]);

        settings.game_mode = GameMode::Analysis;
        assert_eq!(settings.pipeline_channels(), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn test_window_samples() {
        let settings = SessionSettings::default();
        assert_eq!(settings.window_samples(250), 1250);
    }

    #[test]
    fn test_validate_for_board() {
        let descriptor = BoardDescriptor::synthetic();
        let mut config = SystemConfig::default();
        assert!(config.validate_for_board(&descriptor).is_ok());

        config.session.active_channels = vec![1, 42];
        let errors = config.validate_for_board(&descriptor).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("42")));

        config.session.active_channels = vec![1, 2];
        config.processing.filter.bandpass_high_hz = 200.0;
        assert!(config.validate_for_board(&descriptor).is_err());
    }
}
