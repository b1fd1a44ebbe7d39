// src/processing/band_power.rs
//! Relative power in the five canonical EEG bands
//!
//! Spectra are Welch estimates: Hann-windowed segments of a power-of-two
//! length close to the sampling rate, 50 % overlap, one-sided density.
//! Band powers are integrated with the trapezoid rule and normalized per
//! channel so the five bands sum to one.

use ndarray::ArrayView1;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;

use crate::config::constants::bands::{BAND_COUNT, CANONICAL_BANDS_HZ, FEATURE_VECTOR_LEN, MIN_TOTAL_POWER};
use crate::error::{GameError, GameResult, ProcessingStage};
use crate::hal::Frame;

/// Shortest segment a spectrum is computed from
const MIN_SEGMENT_LEN: usize = 8;

/// Band powers of one tick across a group of channels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandPowers {
    /// Mean relative power per band across channels
    pub mean: [f64; BAND_COUNT],
    /// Population variance of the relative power across channels
    pub variance: [f64; BAND_COUNT],
}

impl BandPowers {
    /// Means followed by variances, the model input
    pub fn feature_vector(&self) -> [f64; FEATURE_VECTOR_LEN] {
        let mut features = [0.0; FEATURE_VECTOR_LEN];
        features[..BAND_COUNT].copy_from_slice(&self.mean);
        features[BAND_COUNT..].copy_from_slice(&self.variance);
        features
    }
}

/// One-sided power spectral density
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    /// Trapezoid integral of the density over `[low, high]`
    pub fn band_power(&self, low: f64, high: f64) -> f64 {
        let points: Vec<(f64, f64)> = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(f, _)| **f >= low && **f <= high)
            .map(|(f, p)| (*f, *p))
            .collect();
        points
            .windows(2)
            .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
            .sum()
    }
}

pub struct BandPowerExtractor {
    sampling_rate_hz: f64,
    history: VecDeque<[f64; BAND_COUNT]>,
    capacity: usize,
    planner: FftPlanner<f64>,
}

impl BandPowerExtractor {
    pub fn new(sampling_rate_hz: u32, history_capacity: usize) -> Self {
        Self {
            sampling_rate_hz: sampling_rate_hz as f64,
            history: VecDeque::with_capacity(history_capacity.max(1)),
            capacity: history_capacity.max(1),
            planner: FftPlanner::new(),
        }
    }

    /// Smoothed band power: computes this tick's mean band powers over `rows`,
    /// appends them to the history and returns the mean of the history
    pub fn get_band_power(&mut self, window: &Frame, rows: &[usize]) -> GameResult<[f64; BAND_COUNT]> {
        self.update(window, rows).map(|(_, smoothed)| smoothed)
    }

    /// Like [`get_band_power`](Self::get_band_power) but also returns the raw
    /// estimate of this tick
    pub fn update(&mut self, window: &Frame, rows: &[usize]) -> GameResult<(BandPowers, [f64; BAND_COUNT])> {
        let powers = self.compute(window, rows)?;
        let smoothed = self.record(powers.mean);
        Ok((powers, smoothed))
    }

    /// Append one tick's mean band powers to the history and return the new
    /// smoothed value
    pub fn record(&mut self, mean: [f64; BAND_COUNT]) -> [f64; BAND_COUNT] {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(mean);
        self.smoothed()
    }

    /// Band powers of this tick without touching the history
    pub fn compute(&mut self, window: &Frame, rows: &[usize]) -> GameResult<BandPowers> {
        if rows.is_empty() {
            return Err(band_error("no channels selected"));
        }

        let mut per_channel = Vec::with_capacity(rows.len());
        for &row in rows {
            if row >= window.nrows() {
                return Err(band_error(format!("row {} outside frame of {} rows", row, window.nrows())));
            }
            let spectrum = self.power_spectrum(window.row(row))?;
            per_channel.push(relative_band_powers(&spectrum));
        }

        let n = per_channel.len() as f64;
        let mut powers = BandPowers::default();
        for band in 0..BAND_COUNT {
            let mean = per_channel.iter().map(|p| p[band]).sum::<f64>() / n;
            let variance = per_channel.iter().map(|p| (p[band] - mean).powi(2)).sum::<f64>() / n;
            powers.mean[band] = mean;
            powers.variance[band] = variance;
        }
        Ok(powers)
    }

    /// Welch power spectral density of one channel
    pub fn power_spectrum(&mut self, samples: ArrayView1<f64>) -> GameResult<PowerSpectrum> {
        let n = samples.len();
        let nfft = segment_len(self.sampling_rate_hz, n);
        if nfft < MIN_SEGMENT_LEN {
            return Err(band_error(format!(
                "window of {} samples is too short for a spectrum",
                n
            )));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(band_error("non-finite sample"));
        }

        let fft = self.planner.plan_fft_forward(nfft);
        let window = hann(nfft);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let bins = nfft / 2 + 1;
        let step = nfft / 2;

        let mut accumulated = vec![0.0; bins];
        let mut segments = 0usize;
        let mut buffer = vec![Complex64::new(0.0, 0.0); nfft];
        let mut start = 0;
        while start + nfft <= n {
            let segment = samples.slice(ndarray::s![start..start + nfft]);
            let mean = segment.sum() / nfft as f64;
            for ((slot, sample), w) in buffer.iter_mut().zip(segment.iter()).zip(&window) {
                *slot = Complex64::new((sample - mean) * w, 0.0);
            }
            fft.process(&mut buffer);
            for (acc, value) in accumulated.iter_mut().zip(&buffer) {
                *acc += value.norm_sqr();
            }
            segments += 1;
            start += step;
        }

        let scale = 1.0 / (segments as f64 * self.sampling_rate_hz * window_power);
        let density: Vec<f64> = accumulated
            .iter()
            .enumerate()
            .map(|(k, acc)| {
                let one_sided = if k == 0 || (nfft % 2 == 0 && k == bins - 1) { 1.0 } else { 2.0 };
                acc * scale * one_sided
            })
            .collect();
        let frequencies = (0..bins)
            .map(|k| k as f64 * self.sampling_rate_hz / nfft as f64)
            .collect();

        Ok(PowerSpectrum { frequencies, density })
    }

    /// Mean of the band power history, zeros when empty
    pub fn smoothed(&self) -> [f64; BAND_COUNT] {
        let mut mean = [0.0; BAND_COUNT];
        if self.history.is_empty() {
            return mean;
        }
        for entry in &self.history {
            for (m, v) in mean.iter_mut().zip(entry) {
                *m += v;
            }
        }
        let n = self.history.len() as f64;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn band_error(reason: impl Into<String>) -> GameError {
    GameError::processing(ProcessingStage::BandPower, reason)
}

/// Power of two nearest the sampling rate, shrunk to fit the window
fn segment_len(sampling_rate_hz: f64, available: usize) -> usize {
    let rate = sampling_rate_hz.max(1.0) as usize;
    let upper = rate.next_power_of_two();
    let lower = upper / 2;
    let mut nfft = if lower > 0 && rate - lower < upper - rate { lower } else { upper };
    while nfft > available && nfft > 1 {
        nfft /= 2;
    }
    if nfft > available {
        0
    } else {
        nfft
    }
}

fn hann(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (len - 1) as f64).cos()))
        .collect()
}

fn relative_band_powers(spectrum: &PowerSpectrum) -> [f64; BAND_COUNT] {
    let mut powers = [0.0; BAND_COUNT];
    for (power, (low, high)) in powers.iter_mut().zip(CANONICAL_BANDS_HZ) {
        *power = spectrum.band_power(low, high);
    }
    let total: f64 = powers.iter().sum();
    if total < MIN_TOTAL_POWER {
        return [0.0; BAND_COUNT];
    }
    powers.iter_mut().for_each(|p| *p /= total);
    powers
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const FS: u32 = 250;

    fn sine_frame(freqs: &[f64], len: usize) -> Frame {
        Array2::from_shape_fn((freqs.len() + 1, len), |(row, col)| {
            if row == 0 {
                col as f64
            } else {
                (2.0 * PI * freqs[row - 1] * col as f64 / FS as f64).sin()
            }
        })
    }

    #[test]
    fn test_segment_len() {
        assert_eq!(segment_len(250.0, 1250), 256);
        assert_eq!(segment_len(200.0, 1250), 256);
        assert_eq!(segment_len(125.0, 1250), 128);
        assert_eq!(segment_len(250.0, 100), 64);
        assert_eq!(segment_len(250.0, 0), 0);
    }

    #[test]
    fn test_zero_signal_has_no_power() {
        let mut extractor = BandPowerExtractor::new(FS, 100);
        let frame = Frame::zeros((2, 1250));
        let powers = extractor.compute(&frame, &[1]).unwrap();
        assert!(powers.mean.iter().all(|p| p.abs() < 1e-12));
        assert!(powers.variance.iter().all(|p| p.abs() < 1e-12));
    }

    #[test]
    fn test_sine_power_lands_in_its_band() {
        let mut extractor = BandPowerExtractor::new(FS, 100);
        for (band, freq) in [(0, 2.5), (1, 6.0), (2, 10.0), (3, 20.0), (4, 40.0)] {
            let frame = sine_frame(&[freq], 1250);
            let powers = extractor.compute(&frame, &[1]).unwrap();
            assert!(
                powers.mean[band] > 0.9,
                "{} Hz: {:?}",
                freq,
                powers.mean
            );
            let total: f64 = powers.mean.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_multi_channel_mean_and_variance() {
        let mut extractor = BandPowerExtractor::new(FS, 100);
        let frame = sine_frame(&[10.0, 10.0], 1250);
        let same = extractor.compute(&frame, &[1, 2]).unwrap();
        assert!(same.variance.iter().all(|v| *v < 1e-12));

        let frame = sine_frame(&[10.0, 20.0], 1250);
        let mixed = extractor.compute(&frame, &[1, 2]).unwrap();
        assert!(mixed.mean[2] > 0.4 && mixed.mean[2] < 0.6);
        assert!(mixed.mean[3] > 0.4 && mixed.mean[3] < 0.6);
        assert!(mixed.variance[2] > 0.15);

        let features = mixed.feature_vector();
        assert_eq!(features[2], mixed.mean[2]);
        assert_eq!(features[BAND_COUNT + 2], mixed.variance[2]);
    }

    #[test]
    fn test_history_is_bounded_running_mean() {
        let mut extractor = BandPowerExtractor::new(FS, 3);
        let alpha = sine_frame(&[10.0], 1250);
        let zero = Frame::zeros((2, 1250));

        let smoothed = extractor.get_band_power(&alpha, &[1]).unwrap();
        assert!(smoothed[2] > 0.9);

        let smoothed = extractor.get_band_power(&zero, &[1]).unwrap();
        assert!(smoothed[2] > 0.45 && smoothed[2] < 0.5);

        extractor.get_band_power(&zero, &[1]).unwrap();
        extractor.get_band_power(&zero, &[1]).unwrap();
        assert_eq!(extractor.history_len(), 3);
        assert!(extractor.smoothed()[2].abs() < 1e-12);

        extractor.reset();
        assert_eq!(extractor.smoothed(), [0.0; BAND_COUNT]);
    }

    #[test]
    fn test_invalid_inputs() {
        let mut extractor = BandPowerExtractor::new(FS, 100);
        let frame = Frame::zeros((2, 1250));
        assert!(extractor.compute(&frame, &[]).is_err());
        assert!(extractor.compute(&frame, &[4]).is_err());

        let short = Frame::zeros((2, 4));
        let err = extractor.compute(&short, &[1]).unwrap_err();
        assert!(matches!(err, GameError::Processing { stage: ProcessingStage::BandPower, .. }));
    }
}
