// src/processing/filters/iir.rs
//! Butterworth IIR filters as cascaded second-order sections

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

use super::{check_frequency, BandType, BiquadCoefficients, FilterError};
use crate::config::constants::filters::MAX_FILTER_ORDER;

/// One section in transposed direct form II
#[derive(Debug, Clone)]
pub struct Biquad {
    coefficients: BiquadCoefficients,
    z1: f64,
    z2: f64,
}

impl Biquad {
    pub fn new(coefficients: BiquadCoefficients) -> Self {
        Self {
            coefficients,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let c = &self.coefficients;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Complex response at normalized angular frequency `omega`
    fn response(&self, omega: f64) -> Complex64 {
        let c = &self.coefficients;
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let numerator = c.b0 + z1 * c.b1 + z2 * c.b2;
        let denominator = 1.0 + z1 * c.a1 + z2 * c.a2;
        numerator / denominator
    }
}

/// Cascade of sections applied in order
#[derive(Debug, Clone)]
pub struct IirFilter {
    sections: Vec<Biquad>,
    order: usize,
}

impl IirFilter {
    pub fn from_sections(sections: Vec<BiquadCoefficients>, order: usize) -> Self {
        Self {
            sections: sections.into_iter().map(Biquad::new).collect(),
            order,
        }
    }

    /// Butterworth low-pass or high-pass of the given order
    pub fn butterworth(order: usize, cutoff: f64, sample_rate: f64, band_type: BandType) -> Result<Self, FilterError> {
        check_order(order)?;
        check_frequency("cutoff", cutoff, sample_rate)?;

        let sections = butterworth_sections(order, cutoff, sample_rate, band_type)?;
        Ok(Self::from_sections(sections, order))
    }

    /// Band-pass built from a high-pass at `low` followed by a low-pass at
    /// `high`, each of the given order
    pub fn butterworth_bandpass(order: usize, low: f64, high: f64, sample_rate: f64) -> Result<Self, FilterError> {
        check_order(order)?;
        check_frequency("low cutoff", low, sample_rate)?;
        check_frequency("high cutoff", high, sample_rate)?;
        if low >= high {
            return Err(FilterError::InvalidParameters(format!(
                "low cutoff ({} Hz) must be below high cutoff ({} Hz)",
                low, high
            )));
        }

        let mut sections = butterworth_sections(order, low, sample_rate, BandType::Highpass)?;
        sections.extend(butterworth_sections(order, high, sample_rate, BandType::Lowpass)?);
        Ok(Self::from_sections(sections, 2 * order))
    }

    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |signal, section| section.process_sample(signal))
    }

    /// Filter a buffer in place, continuing from the current state
    pub fn process_in_place(&mut self, samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.sections.iter_mut().for_each(Biquad::reset);
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sections(&self) -> usize {
        self.sections.len()
    }

    /// Magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate;
        self.sections
            .iter()
            .map(|section| section.response(omega))
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

fn check_order(order: usize) -> Result<(), FilterError> {
    if order == 0 || order > MAX_FILTER_ORDER {
        return Err(FilterError::InvalidParameters(format!(
            "Order must be 1-{}, got {}",
            MAX_FILTER_ORDER, order
        )));
    }
    Ok(())
}

/// Pole pair quality factors of an analog Butterworth prototype
fn butterworth_q_factors(order: usize) -> Vec<f64> {
    (0..order / 2)
        .map(|k| {
            let theta = if order % 2 == 0 {
                PI * (2 * k + 1) as f64 / (2 * order) as f64
            } else {
                PI * (k + 1) as f64 / order as f64
            };
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}

fn butterworth_sections(
    order: usize,
    cutoff: f64,
    sample_rate: f64,
    band_type: BandType,
) -> Result<Vec<BiquadCoefficients>, FilterError> {
    let omega = 2.0 * PI * cutoff / sample_rate;
    let (sin_w, cos_w) = omega.sin_cos();

    let mut sections = Vec::with_capacity(order / 2 + 1);
    for q in butterworth_q_factors(order) {
        let alpha = sin_w / (2.0 * q);
        let section = match band_type {
            BandType::Lowpass => BiquadCoefficients::normalized(
                (1.0 - cos_w) / 2.0,
                1.0 - cos_w,
                (1.0 - cos_w) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w,
                1.0 - alpha,
            )?,
            BandType::Highpass => BiquadCoefficients::normalized(
                (1.0 + cos_w) / 2.0,
                -(1.0 + cos_w),
                (1.0 + cos_w) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w,
                1.0 - alpha,
            )?,
        };
        sections.push(section);
    }

    if order % 2 == 1 {
        // Pre-warped first-order section for the real pole
        let k = (PI * cutoff / sample_rate).tan();
        let section = match band_type {
            BandType::Lowpass => BiquadCoefficients::normalized(k, k, 0.0, 1.0 + k, k - 1.0, 0.0)?,
            BandType::Highpass => BiquadCoefficients::normalized(1.0, -1.0, 0.0, 1.0 + k, k - 1.0, 0.0)?,
        };
        sections.push(section);
    }

    Ok(sections)
}
