// src/processing/signal_filter.rs
//! Per-channel conditioning: constant detrend, mains notch, band-pass

use tracing::trace;

use crate::config::FilterConfig;
use crate::error::{GameError, GameResult, ProcessingStage};
use crate::hal::Frame;
use crate::processing::filters::{detrend_constant, FilterError, IirFilter};

/// Conditioning chain for the active rows of a window.
///
/// Filters are designed once; every channel is filtered from a zeroed state
/// because each tick sees the whole window again.
#[derive(Debug, Clone)]
pub struct SignalFilter {
    enabled: bool,
    notch: IirFilter,
    bandpass: IirFilter,
}

impl SignalFilter {
    pub fn new(config: &FilterConfig, sampling_rate_hz: u32) -> GameResult<Self> {
        let fs = sampling_rate_hz as f64;
        let notch = IirFilter::notch(config.mains_frequency_hz, config.notch_bandwidth_hz, fs)?;
        let bandpass = IirFilter::butterworth_bandpass(config.order, config.bandpass_low_hz, config.bandpass_high_hz, fs)?;

        Ok(Self {
            enabled: config.enabled,
            notch,
            bandpass,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Detrend, notch and band-pass one channel in place
    pub fn filter_channel(&self, samples: &mut [f64]) -> Result<(), FilterError> {
        if samples.is_empty() {
            return Err(FilterError::ProcessingError("empty channel".to_string()));
        }
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(FilterError::ProcessingError(format!(
                "non-finite sample at index {}",
                i
            )));
        }
        if !self.enabled {
            return Ok(());
        }

        detrend_constant(samples);

        let mut notch = self.notch.clone();
        notch.reset();
        notch.process_in_place(samples);

        let mut bandpass = self.bandpass.clone();
        bandpass.reset();
        bandpass.process_in_place(samples);
        Ok(())
    }

    /// Filter the listed rows of `frame` in place; other rows are untouched
    pub fn apply(&self, frame: &mut Frame, active_rows: &[usize]) -> GameResult<()> {
        for &row in active_rows {
            if row >= frame.nrows() {
                return Err(GameError::processing(
                    ProcessingStage::Filtering,
                    format!("row {} outside frame of {} rows", row, frame.nrows()),
                ));
            }
            let mut samples = frame.row(row).to_vec();
            self.filter_channel(&mut samples)?;
            frame
                .row_mut(row)
                .iter_mut()
                .zip(samples)
                .for_each(|(dst, src)| *dst = src);
        }
        trace!(rows = ?active_rows, "Filtered active rows");
        Ok(())
    }
}
