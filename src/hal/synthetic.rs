// src/hal/synthetic.rs
//! Synthetic EEG board
//!
//! Produces samples according to elapsed wall-clock time, like a streaming
//! board would, so the processing loop sees realistic batch sizes. Each EEG
//! row is a mixture of one sine per canonical band plus uniform noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::constants::board;
use crate::error::{GameErrorBuilder, GameResult};
use crate::hal::traits::BoardSource;
use crate::hal::types::{BoardDescriptor, Frame};
use crate::utils::time::{SystemTimeProvider, TimeProvider};

/// (frequency Hz, amplitude µV) of the synthetic rhythm components
const COMPONENTS: [(f64, f64); 5] = [
    (2.0, 10.0),
    (6.0, 5.0),
    (10.0, 8.0),
    (20.0, 3.0),
    (40.0, 1.0),
];

/// Per-channel phase offset in radians
const CHANNEL_PHASE_STEP: f64 = 0.7;

/// Synthetic board parameters
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub noise_amplitude: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            noise_amplitude: 1.0,
            seed: 0x5EED,
        }
    }
}

pub struct SyntheticBoard {
    descriptor: BoardDescriptor,
    config: SyntheticConfig,
    time_provider: Arc<dyn TimeProvider>,
    rng: StdRng,
    prepared: bool,
    streaming: bool,
    stream_start_nanos: u64,
    samples_emitted: u64,
    buffer: VecDeque<Vec<f64>>,
    buffer_capacity: usize,
}

impl SyntheticBoard {
    pub fn new(config: SyntheticConfig) -> Self {
        Self::with_time_provider(config, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(config: SyntheticConfig, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            descriptor: BoardDescriptor::synthetic(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            time_provider,
            prepared: false,
            streaming: false,
            stream_start_nanos: 0,
            samples_emitted: 0,
            buffer: VecDeque::new(),
            buffer_capacity: board::DEFAULT_STREAM_BUFFER_SIZE,
        }
    }

    /// Number of samples produced since the stream started
    pub fn samples_emitted(&self) -> u64 {
        self.samples_emitted
    }

    fn error(&self, operation: &str, reason: &str) -> crate::error::GameError {
        GameErrorBuilder::new(&self.descriptor.name, operation).acquisition(reason)
    }

    /// Bring the ring buffer up to the current time
    fn catch_up(&mut self) {
        if !self.streaming {
            return;
        }
        let rate = self.descriptor.sampling_rate_hz as f64;
        let elapsed_nanos = self
            .time_provider
            .now_nanos()
            .saturating_sub(self.stream_start_nanos);
        let due = (elapsed_nanos as f64 * rate / 1e9).floor() as u64;
        if due <= self.samples_emitted {
            return;
        }

        // Samples that would be overwritten immediately are skipped
        let first = self
            .samples_emitted
            .max(due.saturating_sub(self.buffer_capacity as u64));
        for index in first..due {
            let column = self.generate_column(index);
            if self.buffer.len() == self.buffer_capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(column);
        }
        self.samples_emitted = due;
    }

    fn generate_column(&mut self, index: u64) -> Vec<f64> {
        let rate = self.descriptor.sampling_rate_hz as f64;
        let t = index as f64 / rate;
        let mut column = vec![0.0; self.descriptor.row_count];

        column[self.descriptor.package_row] = (index % 256) as f64;
        for (channel, &row) in self.descriptor.eeg_rows.iter().enumerate() {
            let phase = channel as f64 * CHANNEL_PHASE_STEP;
            let signal: f64 = COMPONENTS
                .iter()
                .map(|(freq, amp)| amp * (2.0 * PI * freq * t + phase).sin())
                .sum();
            let noise = if self.config.noise_amplitude > 0.0 {
                self.rng.gen_range(-self.config.noise_amplitude..self.config.noise_amplitude)
            } else {
                0.0
            };
            column[row] = signal + noise;
        }
        column[self.descriptor.timestamp_row] = self.stream_start_nanos as f64 / 1e9 + t;
        column
    }
}

impl BoardSource for SyntheticBoard {
    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    fn prepare_session(&mut self) -> GameResult<()> {
        self.prepared = true;
        info!(board = %self.descriptor.name, "Board session prepared");
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn start_stream(&mut self, buffer_size: usize, _streamer_params: &str) -> GameResult<()> {
        if !self.prepared {
            return Err(self.error("start_stream", "session is not prepared"));
        }
        if buffer_size == 0 {
            return Err(self.error("start_stream", "stream buffer size must be positive"));
        }
        self.buffer_capacity = buffer_size;
        self.buffer.clear();
        self.samples_emitted = 0;
        self.stream_start_nanos = self.time_provider.now_nanos();
        self.streaming = true;
        debug!(buffer_size, "Synthetic stream started");
        Ok(())
    }

    fn stop_stream(&mut self) -> GameResult<()> {
        if !self.streaming {
            return Err(self.error("stop_stream", "stream is not running"));
        }
        self.catch_up();
        self.streaming = false;
        Ok(())
    }

    fn get_current_board_data(&mut self, n_points: usize) -> GameResult<Frame> {
        if !self.prepared {
            return Err(self.error("get_current_board_data", "session is not prepared"));
        }
        self.catch_up();

        let count = n_points.min(self.buffer.len());
        let skip = self.buffer.len() - count;
        let mut frame = self.descriptor.empty_frame(count);
        for (col, column) in self.buffer.iter().skip(skip).enumerate() {
            for (row, value) in column.iter().enumerate() {
                frame[[row, col]] = *value;
            }
        }
        Ok(frame)
    }

    fn config_board(&mut self, command: &str) -> GameResult<String> {
        if !self.prepared {
            return Err(self.error("config_board", "session is not prepared"));
        }
        debug!(command, "Synthetic board ignores configuration command");
        Ok(String::new())
    }

    fn release_session(&mut self) -> GameResult<()> {
        if !self.prepared {
            return Err(self.error("release_session", "session is not prepared"));
        }
        self.streaming = false;
        self.prepared = false;
        self.buffer.clear();
        info!(board = %self.descriptor.name, "Board session released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::MockTimeProvider;

    fn board_with_clock() -> (SyntheticBoard, Arc<MockTimeProvider>) {
        let clock = Arc::new(MockTimeProvider::new(1_000_000_000));
        let board = SyntheticBoard::with_time_provider(SyntheticConfig::default(), clock.clone());
        (board, clock)
    }

    #[test]
    fn test_requires_prepared_session() {
        let (mut board, _clock) = board_with_clock();
        assert!(board.get_current_board_data(10).is_err());
        assert!(board.start_stream(100, "").is_err());
        assert!(board.release_session().is_err());
    }

    #[test]
    fn test_samples_follow_elapsed_time() {
        let (mut board, clock) = board_with_clock();
        board.prepare_session().unwrap();
        board.start_stream(10_000, "").unwrap();

        assert_eq!(board.get_current_board_data(100).unwrap().ncols(), 0);

        clock.advance_secs(0.2);
        let frame = board.get_current_board_data(1000).unwrap();
        assert_eq!(frame.dim(), (10, 50));

        // Reads do not consume
        let again = board.get_current_board_data(1000).unwrap();
        assert_eq!(frame, again);

        let newest = board.get_current_board_data(10).unwrap();
        assert_eq!(newest.ncols(), 10);
        assert_eq!(newest.column(9), frame.column(49));
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let (mut board, clock) = board_with_clock();
        board.prepare_session().unwrap();
        board.start_stream(10_000, "").unwrap();
        clock.advance_secs(1.0);

        let frame = board.get_current_board_data(250).unwrap();
        let timestamps = frame.row(board.descriptor().timestamp_row);
        assert!(timestamps.windows(2).into_iter().all(|w| w[1] > w[0]));
        assert!((timestamps[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_buffer_capacity() {
        let (mut board, clock) = board_with_clock();
        board.prepare_session().unwrap();
        board.start_stream(100, "").unwrap();
        clock.advance_secs(2.0);

        let frame = board.get_current_board_data(1000).unwrap();
        assert_eq!(frame.ncols(), 100);
        assert_eq!(board.samples_emitted(), 500);
        let package = frame.row(0);
        assert_eq!(package[99], (499 % 256) as f64);
    }

    #[test]
    fn test_signal_amplitude_bounded() {
        let (mut board, clock) = board_with_clock();
        board.prepare_session().unwrap();
        board.start_stream(10_000, "").unwrap();
        clock.advance_secs(1.0);

        let frame = board.get_current_board_data(250).unwrap();
        let bound: f64 = COMPONENTS.iter().map(|(_, a)| a).sum::<f64>() + 1.0;
        for &row in &board.descriptor().eeg_rows {
            assert!(frame.row(row).iter().all(|v| v.abs() <= bound));
        }
    }

    #[test]
    fn test_release_stops_stream() {
        let (mut board, _clock) = board_with_clock();
        board.prepare_session().unwrap();
        board.start_stream(100, "").unwrap();
        board.release_session().unwrap();
        assert!(!board.is_prepared());
        assert!(board.stop_stream().is_err());
    }
}
