// tests/common/mod.rs
//! Scripted boards and models shared by the integration tests

#![allow(dead_code)]

use braingame_core::error::{GameErrorBuilder, GameResult};
use braingame_core::hal::{BoardDescriptor, BoardId, BoardSource, Frame};
use braingame_core::processing::{FeatureVector, FocusModel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Observations of a [`ScriptedBoard`] that outlive the board itself
#[derive(Debug, Default, Clone)]
pub struct BoardObserver {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub pulls: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub streaming: Arc<AtomicBool>,
    /// Samples produced so far, shared so a reopened board continues the
    /// same timeline
    pub produced: Arc<AtomicUsize>,
}

/// Deterministic board: every pull produces `samples_per_pull` new columns
/// of a 10 Hz rhythm, and pulls fail once `fail_after` is reached
pub struct ScriptedBoard {
    descriptor: BoardDescriptor,
    samples_per_pull: usize,
    fail_after: Option<usize>,
    columns: VecDeque<Vec<f64>>,
    prepared: bool,
    observer: BoardObserver,
}

impl ScriptedBoard {
    pub fn new(board_id: BoardId, samples_per_pull: usize, fail_after: Option<usize>, observer: BoardObserver) -> Self {
        Self {
            descriptor: board_id.descriptor(),
            samples_per_pull,
            fail_after,
            columns: VecDeque::new(),
            prepared: false,
            observer,
        }
    }

    fn next_column(&mut self) -> Vec<f64> {
        let rate = self.descriptor.sampling_rate_hz as f64;
        let index = self.observer.produced.fetch_add(1, Ordering::SeqCst);
        let t = index as f64 / rate;
        let mut column = vec![0.0; self.descriptor.row_count];
        column[self.descriptor.package_row] = (index % 256) as f64;
        for (i, &row) in self.descriptor.eeg_rows.iter().enumerate() {
            column[row] = 10.0 * (2.0 * PI * 10.0 * t + i as f64).sin() + 2.0 * (2.0 * PI * 20.0 * t).sin();
        }
        column[self.descriptor.timestamp_row] = 1_000.0 + t;
        column
    }
}

impl BoardSource for ScriptedBoard {
    fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    fn prepare_session(&mut self) -> GameResult<()> {
        self.prepared = true;
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn start_stream(&mut self, _buffer_size: usize, _streamer_params: &str) -> GameResult<()> {
        self.observer.streaming.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_stream(&mut self) -> GameResult<()> {
        if !self.observer.streaming.swap(false, Ordering::SeqCst) {
            return Err(GameErrorBuilder::new("scripted", "stop_stream").invalid_state("not streaming"));
        }
        Ok(())
    }

    fn get_current_board_data(&mut self, n_points: usize) -> GameResult<Frame> {
        let pulls = self.observer.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after.is_some_and(|limit| pulls > limit) {
            return Err(GameErrorBuilder::new("scripted", "get_current_board_data").acquisition("device disconnected"));
        }
        for _ in 0..self.samples_per_pull {
            let column = self.next_column();
            self.columns.push_back(column);
        }
        while self.columns.len() > 4_096 {
            self.columns.pop_front();
        }

        let count = n_points.min(self.columns.len());
        let skip = self.columns.len() - count;
        let mut frame = self.descriptor.empty_frame(count);
        for (col, column) in self.columns.iter().skip(skip).enumerate() {
            for (row, value) in column.iter().enumerate() {
                frame[[row, col]] = *value;
            }
        }
        Ok(frame)
    }

    fn config_board(&mut self, command: &str) -> GameResult<String> {
        self.observer.commands.lock().push(command.to_string());
        Ok("success".to_string())
    }

    fn release_session(&mut self) -> GameResult<()> {
        self.prepared = false;
        self.observer.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Model that counts prepare and release calls and can fail on demand
pub struct CountingModel {
    pub prepares: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub fail_prepare: bool,
    pub fail_predict_after: Option<usize>,
    /// Replayed in order instead of the beta feature; the last value repeats
    pub outputs: Vec<f64>,
    /// Prediction number (from 1) that returns NaN
    pub nan_at: Option<usize>,
    /// NaN outputs returned so far
    pub nans: Arc<AtomicUsize>,
    predictions: usize,
}

impl CountingModel {
    pub fn new(prepares: Arc<AtomicUsize>, releases: Arc<AtomicUsize>) -> Self {
        Self {
            prepares,
            releases,
            fail_prepare: false,
            fail_predict_after: None,
            outputs: Vec::new(),
            nan_at: None,
            nans: Arc::new(AtomicUsize::new(0)),
            predictions: 0,
        }
    }
}

impl FocusModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    fn prepare(&mut self) -> GameResult<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        if self.fail_prepare {
            return Err(GameErrorBuilder::new("counting", "prepare").model("weights missing"));
        }
        Ok(())
    }

    fn predict(&mut self, features: &FeatureVector) -> GameResult<f64> {
        self.predictions += 1;
        if self.fail_predict_after.is_some_and(|limit| self.predictions > limit) {
            return Err(GameErrorBuilder::new("counting", "predict").model("backend crashed"));
        }
        if self.nan_at == Some(self.predictions) {
            self.nans.fetch_add(1, Ordering::SeqCst);
            return Ok(f64::NAN);
        }
        match self.outputs.last() {
            Some(&last) => Ok(self.outputs.get(self.predictions - 1).copied().unwrap_or(last)),
            None => Ok(features[3].clamp(0.0, 1.0)),
        }
    }

    fn release(&mut self) -> GameResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` every few milliseconds for up to two seconds
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    condition()
}
