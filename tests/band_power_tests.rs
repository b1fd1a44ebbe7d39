// tests/band_power_tests.rs
//! Band power extraction over filtered windows

use braingame_core::config::constants::bands::CANONICAL_BANDS_HZ;
use braingame_core::config::FilterConfig;
use braingame_core::hal::Frame;
use braingame_core::processing::{BandPowerExtractor, SignalFilter};
use std::f64::consts::PI;

const RATE: u32 = 250;
const WINDOW: usize = 1250;

fn sine_frame(rows: usize, frequency_hz: f64, amplitude: f64) -> Frame {
    Frame::from_shape_fn((rows, WINDOW), |(row, col)| {
        let t = col as f64 / RATE as f64;
        amplitude * (2.0 * PI * frequency_hz * t + row as f64 * 0.3).sin()
    })
}

#[test]
fn test_zero_signal_has_no_band_power() {
    let mut extractor = BandPowerExtractor::new(RATE, 100);
    let frame = Frame::zeros((3, WINDOW));
    let smoothed = extractor.get_band_power(&frame, &[1, 2]).unwrap();
    assert!(smoothed.iter().all(|p| p.abs() < 1e-9));
}

#[test]
fn test_sine_power_lands_in_its_band() {
    let centres = [2.5, 6.0, 10.0, 20.0, 40.0];
    for (band, &frequency) in centres.iter().enumerate() {
        let (low, high) = CANONICAL_BANDS_HZ[band];
        assert!(frequency > low && frequency < high);

        let mut extractor = BandPowerExtractor::new(RATE, 100);
        let frame = sine_frame(2, frequency, 20.0);
        let powers = extractor.compute(&frame, &[0, 1]).unwrap();
        assert!(
            powers.mean[band] > 0.8,
            "{} Hz: band {} holds {:?}",
            frequency,
            band,
            powers.mean
        );
        // Identical spectra on both channels
        assert!(powers.variance.iter().all(|v| *v < 1e-6));
    }
}

#[test]
fn test_filtered_alpha_rhythm_stays_alpha() {
    let filter = SignalFilter::new(&FilterConfig::default(), RATE).unwrap();
    let mut frame = sine_frame(3, 10.0, 15.0);
    // Slow drift and mains hum on top of the rhythm
    for col in 0..WINDOW {
        let t = col as f64 / RATE as f64;
        for row in 1..3 {
            frame[[row, col]] += 40.0 + 5.0 * (2.0 * PI * 50.0 * t).sin();
        }
    }
    filter.apply(&mut frame, &[1, 2]).unwrap();

    let mut extractor = BandPowerExtractor::new(RATE, 100);
    let powers = extractor.compute(&frame, &[1, 2]).unwrap();
    let alpha = powers.mean[2];
    assert!(alpha > 0.8, "alpha share {}", alpha);
}

#[test]
fn test_history_smooths_and_stays_bounded() {
    let mut extractor = BandPowerExtractor::new(RATE, 4);
    let alpha = sine_frame(1, 10.0, 10.0);
    let beta = sine_frame(1, 20.0, 10.0);

    extractor.get_band_power(&alpha, &[0]).unwrap();
    let smoothed = extractor.get_band_power(&beta, &[0]).unwrap();
    assert!((smoothed[2] - smoothed[3]).abs() < 0.2);
    assert!(smoothed[2] > 0.35 && smoothed[3] > 0.35);

    for _ in 0..10 {
        extractor.get_band_power(&beta, &[0]).unwrap();
    }
    assert_eq!(extractor.history_len(), 4);
    assert!(extractor.smoothed()[3] > 0.8);
}

#[test]
fn test_rows_outside_frame_fail() {
    let mut extractor = BandPowerExtractor::new(RATE, 10);
    let frame = Frame::zeros((2, WINDOW));
    assert!(extractor.compute(&frame, &[5]).is_err());
    assert!(extractor.compute(&frame, &[]).is_err());
}
