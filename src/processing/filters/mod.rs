// src/processing/filters/mod.rs
//! Digital filters for EEG conditioning

pub mod iir;
pub mod notch;

pub use iir::*;
pub use notch::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    Lowpass,
    Highpass,
}

/// Normalized second-order section coefficients (`a0 == 1`). First-order
/// sections leave `b2` and `a2` at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Divide every coefficient by `a0`
    pub fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Result<Self, FilterError> {
        if a0 == 0.0 || !a0.is_finite() {
            return Err(FilterError::InvalidCoefficients(format!("a0 = {}", a0)));
        }
        let coefficients = Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        };
        let all = [coefficients.b0, coefficients.b1, coefficients.b2, coefficients.a1, coefficients.a2];
        if all.iter().any(|c| !c.is_finite()) {
            return Err(FilterError::InvalidCoefficients(format!("{:?}", coefficients)));
        }
        Ok(coefficients)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Invalid coefficients: {0}")]
    InvalidCoefficients(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

/// Subtract the mean so the signal is centred on zero
pub fn detrend_constant(samples: &mut [f64]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter_mut().for_each(|s| *s -= mean);
}

/// Check that a cutoff lies strictly between 0 and Nyquist
pub(crate) fn check_frequency(name: &str, freq_hz: f64, sample_rate: f64) -> Result<(), FilterError> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(FilterError::InvalidParameters(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }
    if !freq_hz.is_finite() || freq_hz <= 0.0 || freq_hz >= sample_rate / 2.0 {
        return Err(FilterError::InvalidParameters(format!(
            "{} ({} Hz) must lie between 0 and Nyquist ({} Hz)",
            name,
            freq_hz,
            sample_rate / 2.0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detrend_constant() {
        let mut samples = vec![1.0, 2.0, 3.0, 6.0];
        detrend_constant(&mut samples);
        assert_eq!(samples, vec![-2.0, -1.0, 0.0, 3.0]);

        let mut empty: Vec<f64> = Vec::new();
        detrend_constant(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_normalized_coefficients() {
        let c = BiquadCoefficients::normalized(2.0, 4.0, 2.0, 2.0, 1.0, 0.5).unwrap();
        assert_eq!(c.b1, 2.0);
        assert_eq!(c.a2, 0.25);
        assert!(BiquadCoefficients::normalized(1.0, 0.0, 0.0, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_check_frequency() {
        assert!(check_frequency("cutoff", 50.0, 250.0).is_ok());
        assert!(check_frequency("cutoff", 125.0, 250.0).is_err());
        assert!(check_frequency("cutoff", 0.0, 250.0).is_err());
        assert!(check_frequency("cutoff", 10.0, 0.0).is_err());
    }
}
