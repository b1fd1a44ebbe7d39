// src/error.rs
//! Unified error handling for the BrainGame core
//!
//! Errors are grouped by how the session reacts to them:
//! configuration errors are reported and rolled back, acquisition errors end
//! the running session, processing errors skip a single tick, and lifecycle
//! errors are logged from cleanup paths that must keep going.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::processing::filters::FilterError;

/// Unified error type for the entire pipeline
#[derive(Debug, Clone, Error)]
pub enum GameError {
    /// Invalid settings, unknown board ids or unreachable devices
    #[error("[CONFIG] {component}: {reason}")]
    Configuration { component: String, reason: String },

    /// The acquisition device failed while a session was running
    #[error("[ACQUISITION] {board}: {reason}")]
    Acquisition { board: String, reason: String },

    /// A single tick could not be computed
    #[error("[PROCESSING] {stage} stage error: {reason}")]
    Processing { stage: ProcessingStage, reason: String },

    /// The regression model failed to prepare, predict or release
    #[error("[MODEL] {operation} failed: {reason}")]
    Model { operation: String, reason: String },

    /// A resource could not be released cleanly
    #[error("[LIFECYCLE] failed to release {resource}: {reason}")]
    Lifecycle { resource: String, reason: String },

    /// Operation called in a state that does not allow it
    #[error("[STATE] cannot {operation}: {reason}")]
    InvalidState { operation: String, reason: String },
}

/// Pipeline stages used to tag processing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    Acquisition,
    Buffering,
    Filtering,
    BandPower,
    Classification,
    Decision,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Acquisition => "acquisition",
            ProcessingStage::Buffering => "buffering",
            ProcessingStage::Filtering => "filtering",
            ProcessingStage::BandPower => "band-power",
            ProcessingStage::Classification => "classification",
            ProcessingStage::Decision => "decision",
        };
        f.write_str(name)
    }
}

impl GameError {
    /// Processing errors only cost one tick; everything else ends the loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GameError::Processing { .. })
    }

    /// Shorthand for a processing error at the given stage
    pub fn processing(stage: ProcessingStage, reason: impl Into<String>) -> Self {
        GameError::Processing {
            stage,
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration error
    pub fn configuration(component: &str, reason: impl Into<String>) -> Self {
        GameError::Configuration {
            component: component.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<FilterError> for GameError {
    fn from(err: FilterError) -> Self {
        GameError::processing(ProcessingStage::Filtering, err.to_string())
    }
}

impl From<ConfigError> for GameError {
    fn from(err: ConfigError) -> Self {
        GameError::configuration("config_loader", err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type GameResult<T> = Result<T, GameError>;

/// Error builder for convenient error construction
pub struct GameErrorBuilder {
    component: String,
    operation: String,
}

impl GameErrorBuilder {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn configuration(self, reason: &str) -> GameError {
        GameError::Configuration {
            component: self.component,
            reason: format!("{} ({})", reason, self.operation),
        }
    }

    pub fn acquisition(self, reason: &str) -> GameError {
        GameError::Acquisition {
            board: self.component,
            reason: format!("{} ({})", reason, self.operation),
        }
    }

    pub fn model(self, reason: &str) -> GameError {
        GameError::Model {
            operation: format!("{}::{}", self.component, self.operation),
            reason: reason.to_string(),
        }
    }

    pub fn lifecycle(self, reason: &str) -> GameError {
        GameError::Lifecycle {
            resource: self.component,
            reason: format!("{} ({})", reason, self.operation),
        }
    }

    pub fn invalid_state(self, reason: &str) -> GameError {
        GameError::InvalidState {
            operation: format!("{}::{}", self.component, self.operation),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_builder() {
        let err = GameErrorBuilder::new("board", "prepare_session").configuration("no driver");

        match err {
            GameError::Configuration { component, reason } => {
                assert_eq!(component, "board");
                assert!(reason.contains("no driver"));
                assert!(reason.contains("prepare_session"));
            }
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_recoverability() {
        assert!(GameError::processing(ProcessingStage::Filtering, "bad shape").is_recoverable());
        assert!(!GameErrorBuilder::new("synthetic", "read").acquisition("gone").is_recoverable());
        assert!(!GameError::configuration("session", "bad").is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = GameError::processing(ProcessingStage::BandPower, "window too short");
        let display = format!("{}", err);
        assert!(display.contains("band-power"));
        assert!(display.contains("window too short"));
    }

    #[test]
    fn test_filter_error_conversion() {
        let err: GameError = FilterError::InvalidParameters("order".to_string()).into();
        match err {
            GameError::Processing { stage, .. } => assert_eq!(stage, ProcessingStage::Filtering),
            _ => panic!("Expected processing error"),
        }
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GameError>();
    }
}
