// src/hal/traits.rs
//! Acquisition source abstraction

use crate::config::BoardSettings;
use crate::error::GameResult;
use crate::hal::types::{BoardDescriptor, Frame};

/// Pull-based acquisition board.
///
/// Mirrors the session calls of the acquisition library: the board is
/// prepared once, streams into its own ring buffer, and the pipeline pulls
/// the newest columns on every tick without consuming them.
pub trait BoardSource: Send {
    /// Static layout of the board's data
    fn descriptor(&self) -> &BoardDescriptor;

    fn prepare_session(&mut self) -> GameResult<()>;

    fn is_prepared(&self) -> bool;

    fn start_stream(&mut self, buffer_size: usize, streamer_params: &str) -> GameResult<()>;

    fn stop_stream(&mut self) -> GameResult<()>;

    /// Newest `n_points` columns, or fewer if the board has not produced that
    /// many yet
    fn get_current_board_data(&mut self, n_points: usize) -> GameResult<Frame>;

    /// Send a raw configuration command and return the board's reply
    fn config_board(&mut self, command: &str) -> GameResult<String>;

    fn release_session(&mut self) -> GameResult<()>;
}

/// Opens boards from settings
pub trait BoardProvider: Send + Sync {
    fn open(&self, settings: &BoardSettings) -> GameResult<Box<dyn BoardSource>>;
}
