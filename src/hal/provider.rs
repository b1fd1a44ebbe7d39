// src/hal/provider.rs
//! Board factory

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::BoardSettings;
use crate::error::{GameErrorBuilder, GameResult};
use crate::hal::synthetic::{SyntheticBoard, SyntheticConfig};
use crate::hal::traits::{BoardProvider, BoardSource};
use crate::hal::types::BoardId;
use crate::utils::time::{SystemTimeProvider, TimeProvider};

/// Constructor for a hardware board driver
pub type DriverFactory = Box<dyn Fn(&BoardSettings) -> GameResult<Box<dyn BoardSource>> + Send + Sync>;

/// Opens the synthetic board directly and hardware boards through
/// registered drivers
pub struct DefaultBoardProvider {
    time_provider: Arc<dyn TimeProvider>,
    synthetic: SyntheticConfig,
    drivers: HashMap<BoardId, DriverFactory>,
}

impl DefaultBoardProvider {
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            synthetic: SyntheticConfig::default(),
            drivers: HashMap::new(),
        }
    }

    pub fn with_synthetic_config(mut self, config: SyntheticConfig) -> Self {
        self.synthetic = config;
        self
    }

    /// Register the driver used for `board`, replacing any earlier one
    pub fn register_driver<F>(&mut self, board: BoardId, factory: F)
    where
        F: Fn(&BoardSettings) -> GameResult<Box<dyn BoardSource>> + Send + Sync + 'static,
    {
        self.drivers.insert(board, Box::new(factory));
    }
}

impl Default for DefaultBoardProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardProvider for DefaultBoardProvider {
    fn open(&self, settings: &BoardSettings) -> GameResult<Box<dyn BoardSource>> {
        let board = settings.board_id;
        let errors = GameErrorBuilder::new(&board.to_string(), "open");

        if board.is_hardware() && settings.serial_port.trim().is_empty() {
            return Err(errors.configuration("a serial port is required"));
        }

        if let Some(factory) = self.drivers.get(&board) {
            info!(%board, port = %settings.serial_port, "Opening board through registered driver");
            return factory(settings);
        }

        match board {
            BoardId::Synthetic => Ok(Box::new(SyntheticBoard::with_time_provider(
                self.synthetic.clone(),
                self.time_provider.clone(),
            ))),
            _ => Err(errors.configuration("no driver registered for this board")),
        }
    }
}
