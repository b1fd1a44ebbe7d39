// src/acquisition/channel_buffer.rs
//! Fixed-width sliding window over every board row

use ndarray::{s, Axis};
use tracing::trace;

use crate::error::{GameError, GameResult, ProcessingStage};
use crate::hal::Frame;

/// The most recent `window_samples` columns of the board stream.
///
/// Allocated zero-filled; every merge shifts the window left by the batch
/// width and writes the batch into the tail, so the column count never
/// changes and the newest sample is always the last column.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    window: Frame,
    timestamp_row: usize,
}

impl ChannelBuffer {
    pub fn new(rows: usize, window_samples: usize, timestamp_row: usize) -> GameResult<Self> {
        if window_samples == 0 {
            return Err(GameError::processing(
                ProcessingStage::Buffering,
                "window must hold at least one sample",
            ));
        }
        if timestamp_row >= rows {
            return Err(GameError::processing(
                ProcessingStage::Buffering,
                format!("timestamp row {} outside {} rows", timestamp_row, rows),
            ));
        }
        Ok(Self {
            window: Frame::zeros((rows, window_samples)),
            timestamp_row,
        })
    }

    /// Start from an existing window, e.g. when restarting a session
    pub fn from_window(window: Frame, timestamp_row: usize) -> GameResult<Self> {
        let mut buffer = Self::new(window.nrows(), window.ncols(), timestamp_row)?;
        buffer.window = window;
        Ok(buffer)
    }

    pub fn window(&self) -> &Frame {
        &self.window
    }

    pub fn window_samples(&self) -> usize {
        self.window.ncols()
    }

    pub fn rows(&self) -> usize {
        self.window.nrows()
    }

    /// Timestamp of the newest merged column
    pub fn latest_timestamp(&self) -> f64 {
        self.window[[self.timestamp_row, self.window.ncols() - 1]]
    }

    /// Shift the window left by the batch width and append the batch. A batch
    /// at least as wide as the window replaces it with its newest columns.
    pub fn merge(&mut self, batch: &Frame) -> GameResult<&Frame> {
        if batch.nrows() != self.window.nrows() {
            return Err(GameError::processing(
                ProcessingStage::Buffering,
                format!(
                    "frame has {} rows, window has {}",
                    batch.nrows(),
                    self.window.nrows()
                ),
            ));
        }

        let width = self.window.ncols();
        let incoming = batch.ncols();
        if incoming >= width {
            self.window.assign(&batch.slice(s![.., incoming - width..]));
        } else if incoming > 0 {
            let kept = width - incoming;
            let tail = self.window.slice(s![.., incoming..]).to_owned();
            self.window.slice_mut(s![.., ..kept]).assign(&tail);
            self.window.slice_mut(s![.., kept..]).assign(batch);
        }
        trace!(incoming, width, "Merged batch into channel window");
        Ok(&self.window)
    }

    /// Merge only the columns newer than the newest merged sample.
    ///
    /// Boards return their newest columns without consuming them, so
    /// consecutive pulls overlap; this drops the overlap before merging.
    pub fn merge_fresh(&mut self, batch: &Frame) -> GameResult<usize> {
        if batch.nrows() != self.window.nrows() {
            return self.merge(batch).map(|_| 0);
        }
        let latest = self.latest_timestamp();
        let fresh: Vec<usize> = batch
            .row(self.timestamp_row)
            .iter()
            .enumerate()
            .filter(|(_, t)| **t > latest)
            .map(|(i, _)| i)
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        let fresh_batch = batch.select(Axis(1), &fresh);
        self.merge(&fresh_batch)?;
        Ok(fresh.len())
    }

    /// Zero the window
    pub fn reset(&mut self) {
        self.window.fill(0.0);
    }
}
