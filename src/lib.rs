//! BrainGame core: real-time EEG focus pipeline for a two-player BCI maze
//!
//! EEG samples stream from an acquisition board, are filtered and reduced to
//! band powers, mapped to a per-player focus metric by a regression model,
//! and sustained focus peaks are turned into discrete maze tilts.
//!
//! - Acquisition board abstraction with a synthetic EEG board
//! - Sliding channel window and single-slot result mailbox
//! - Detrend, notch and Butterworth band-pass filtering
//! - Welch band power over the five canonical EEG bands
//! - Pluggable focus model with an explicit lifetime
//! - Debounced, alternating peak-to-action state machine
//! - Session lifecycle with settings rollback and warm restarts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use braingame_core::actuation::{channel_sink, MotorDispatcher, ServoMap, TracingMotorDriver};
//! use braingame_core::config::SystemConfig;
//! use braingame_core::hal::DefaultBoardProvider;
//! use braingame_core::session::BrainGame;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SystemConfig::default();
//!     let (sink, commands) = channel_sink(config.actuation.command_queue_size);
//!     let dispatcher = MotorDispatcher::spawn(
//!         commands,
//!         TracingMotorDriver::new(),
//!         ServoMap::for_session(&config),
//!     )?;
//!
//!     let mut game = BrainGame::new(Arc::new(DefaultBoardProvider::new()), Arc::new(sink));
//!     if !game.apply_settings(config) {
//!         return Err("board could not be prepared".into());
//!     }
//!     game.start_game(true)?;
//!
//!     let mut results = game.subscribe();
//!     for _ in 0..10 {
//!         let tick = results.recv()?;
//!         println!("focus: {:?}", tick.players.iter().map(|p| p.focus).collect::<Vec<_>>());
//!     }
//!
//!     game.quit()?;
//!     drop(game);
//!     dispatcher.join()?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod actuation;
pub mod config;
pub mod error;
pub mod hal;
pub mod processing;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{ChannelBuffer, Mailbox, MailboxError, MailboxReceiver};
pub use actuation::{Action, ActionSink, ActuatorCommand, Direction};
pub use config::{ConfigLoader, GameMode, SystemConfig};
pub use error::{GameError, GameResult, ProcessingStage};
pub use hal::{BoardDescriptor, BoardId, BoardProvider, BoardSource, DefaultBoardProvider, Frame, SyntheticBoard};
pub use processing::{GameLoop, TickResult};
pub use session::BrainGame;
pub use utils::time::{current_timestamp_nanos, TickRateMeter, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Real-time EEG focus pipeline driving a two-player BCI maze game".to_string(),
        features: vec![
            "Acquisition board abstraction".to_string(),
            "EEG filtering and band power".to_string(),
            "Pluggable focus model".to_string(),
            "Debounced peak-to-action decisions".to_string(),
            "Session lifecycle with rollback".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
