// src/hal/types.rs
//! Board identifiers, board metadata and the sample frame type

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::constants::board;
use crate::error::{GameError, GameResult};

/// Rows × columns block of samples. One row per board channel (including the
/// timestamp row), one column per acquisition tick, oldest column first.
pub type Frame = Array2<f64>;

/// Supported acquisition boards. Integer ids follow the acquisition
/// library's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardId {
    Playback,
    Synthetic,
    Cyton,
    Ganglion,
    CytonDaisy,
}

impl BoardId {
    pub const ALL: [BoardId; 5] = [
        BoardId::Playback,
        BoardId::Synthetic,
        BoardId::Cyton,
        BoardId::Ganglion,
        BoardId::CytonDaisy,
    ];

    pub fn as_i32(self) -> i32 {
        match self {
            BoardId::Playback => -3,
            BoardId::Synthetic => -1,
            BoardId::Cyton => 0,
            BoardId::Ganglion => 1,
            BoardId::CytonDaisy => 2,
        }
    }

    /// Map a numeric board id; unknown ids are a configuration error
    pub fn from_i32(id: i32) -> GameResult<Self> {
        Self::ALL
            .into_iter()
            .find(|board| board.as_i32() == id)
            .ok_or_else(|| GameError::configuration("board", format!("unknown board id {}", id)))
    }

    /// Boards that need a physical device and a driver
    pub fn is_hardware(self) -> bool {
        !matches!(self, BoardId::Synthetic | BoardId::Playback)
    }

    /// Boards whose channels can be switched to differential input
    pub fn supports_differential_mode(self) -> bool {
        matches!(self, BoardId::Cyton | BoardId::CytonDaisy)
    }

    /// Static metadata of the board's data layout
    pub fn descriptor(self) -> BoardDescriptor {
        match self {
            BoardId::Synthetic | BoardId::Playback => {
                let mut descriptor = BoardDescriptor::synthetic();
                descriptor.board_id = self;
                descriptor.name = self.to_string();
                descriptor
            }
            BoardId::Cyton => BoardDescriptor::new(self, 250, 24, 0, 22, (1..=8).collect()),
            BoardId::Ganglion => BoardDescriptor::new(self, 200, 15, 0, 13, (1..=4).collect()),
            BoardId::CytonDaisy => BoardDescriptor::new(self, 125, 32, 0, 30, (1..=16).collect()),
        }
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoardId::Playback => "playback",
            BoardId::Synthetic => "synthetic",
            BoardId::Cyton => "cyton",
            BoardId::Ganglion => "ganglion",
            BoardId::CytonDaisy => "cyton_daisy",
        };
        f.write_str(name)
    }
}

/// Data layout of a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    pub board_id: BoardId,
    pub name: String,
    pub sampling_rate_hz: u32,
    pub row_count: usize,
    pub package_row: usize,
    pub timestamp_row: usize,
    pub eeg_rows: Vec<usize>,
}

impl BoardDescriptor {
    pub fn new(
        board_id: BoardId,
        sampling_rate_hz: u32,
        row_count: usize,
        package_row: usize,
        timestamp_row: usize,
        eeg_rows: Vec<usize>,
    ) -> Self {
        Self {
            board_id,
            name: board_id.to_string(),
            sampling_rate_hz,
            row_count,
            package_row,
            timestamp_row,
            eeg_rows,
        }
    }

    /// Layout of the built-in synthetic board: package counter in row 0,
    /// EEG in rows 1..=8, timestamps in the last row.
    pub fn synthetic() -> Self {
        let eeg_rows: Vec<usize> = (1..=board::SYNTHETIC_EEG_CHANNELS).collect();
        let timestamp_row = board::SYNTHETIC_EEG_CHANNELS + 1;
        Self::new(
            BoardId::Synthetic,
            board::SYNTHETIC_SAMPLING_RATE_HZ,
            timestamp_row + 1,
            0,
            timestamp_row,
            eeg_rows,
        )
    }

    pub fn channel_count(&self) -> usize {
        self.eeg_rows.len()
    }

    /// Empty frame with this board's row count
    pub fn empty_frame(&self, columns: usize) -> Frame {
        Frame::zeros((self.row_count, columns))
    }
}
