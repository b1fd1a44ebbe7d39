// src/processing/filters/notch.rs
//! Mains interference notch

use std::f64::consts::PI;

use super::{check_frequency, BiquadCoefficients, FilterError, IirFilter};

impl IirFilter {
    /// Second-order notch centred on `center_hz` with the given -3 dB
    /// bandwidth
    pub fn notch(center_hz: f64, bandwidth_hz: f64, sample_rate: f64) -> Result<Self, FilterError> {
        check_frequency("notch frequency", center_hz, sample_rate)?;
        if !bandwidth_hz.is_finite() || bandwidth_hz <= 0.0 || bandwidth_hz >= center_hz * 2.0 {
            return Err(FilterError::InvalidParameters(format!(
                "notch bandwidth must be positive and narrower than twice the centre, got {} Hz",
                bandwidth_hz
            )));
        }

        let q = center_hz / bandwidth_hz;
        let omega = 2.0 * PI * center_hz / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_w = omega.cos();

        let section = BiquadCoefficients::normalized(1.0, -2.0 * cos_w, 1.0, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)?;
        Ok(IirFilter::from_sections(vec![section], 2))
    }
}
