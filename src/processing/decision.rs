// src/processing/decision.rs
//! Peak detection and the per-player action state machine
//!
//! Peak detection re-runs over the whole focus history every tick, so one
//! physical focus spike is reported again on every tick until it scrolls out
//! of the history. Candidates closer than the debounce interval to an already
//! recorded peak are therefore treated as the same peak.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::actuation::{Action, ActionAxis, Position};
use crate::config::DecisionConfig;
use crate::processing::focus::FocusSeries;

/// Finds sustained excursions above a height threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetector {
    pub min_height: f64,
    pub min_width: usize,
}

impl PeakDetector {
    pub fn new(min_height: f64, min_width: usize) -> Self {
        Self {
            min_height,
            min_width: min_width.max(1),
        }
    }

    /// Index of the first maximum of every run of at least `min_width`
    /// consecutive samples `>= min_height` that has a below-threshold sample
    /// on both sides. Runs still touching either end of `values` are not
    /// complete yet and are skipped.
    pub fn find_peaks(&self, values: &[f64]) -> Vec<usize> {
        let mut peaks = Vec::new();
        let mut run_start: Option<usize> = None;

        for (i, &value) in values.iter().enumerate() {
            let above = value >= self.min_height;
            match (run_start, above) {
                (None, true) => run_start = Some(i),
                (Some(start), false) => {
                    run_start = None;
                    if start > 0 && i - start >= self.min_width {
                        peaks.push(first_max(values, start, i));
                    }
                }
                _ => {}
            }
        }
        peaks
    }
}

impl From<&DecisionConfig> for PeakDetector {
    fn from(config: &DecisionConfig) -> Self {
        Self::new(config.min_peak_height, config.min_peak_width_samples)
    }
}

fn first_max(values: &[f64], start: usize, end: usize) -> usize {
    let mut best = start;
    for i in start + 1..end {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}

/// Peak bookkeeping of one player
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PeakState {
    #[default]
    NoPeakYet,
    HasPeak { peak_times: Vec<f64> },
}

impl PeakState {
    pub fn peak_times(&self) -> &[f64] {
        match self {
            PeakState::NoPeakYet => &[],
            PeakState::HasPeak { peak_times } => peak_times,
        }
    }
}

/// Peak record carried across a restart. Peak times are relative to the
/// anchor given to [`DecisionEngine::snapshot`], normally the newest focus
/// entry, so they line up with a re-anchored [`FocusSeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub relative_peak_times: Vec<f64>,
    pub position: Position,
}

/// Turns one player's focus history into debounced, alternating actions
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    player: usize,
    axis: ActionAxis,
    detector: PeakDetector,
    debounce_seconds: f64,
    state: PeakState,
    position: Position,
}

impl DecisionEngine {
    /// The debounce interval is `debounce_samples` board samples, converted to
    /// seconds with the board's sampling rate
    pub fn new(player: usize, config: &DecisionConfig, sampling_rate_hz: u32) -> Self {
        let debounce_seconds = config.debounce_samples as f64 / sampling_rate_hz.max(1) as f64;
        Self::with_debounce(player, PeakDetector::from(config), debounce_seconds)
    }

    pub fn with_debounce(player: usize, detector: PeakDetector, debounce_seconds: f64) -> Self {
        Self {
            player,
            axis: ActionAxis::for_player(player),
            detector,
            debounce_seconds,
            state: PeakState::NoPeakYet,
            position: Position::Initial,
        }
    }

    pub fn player(&self) -> usize {
        self.player
    }

    pub fn state(&self) -> &PeakState {
        &self.state
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn debounce_seconds(&self) -> f64 {
        self.debounce_seconds
    }

    /// Scan the focus history and return the actions of newly confirmed peaks,
    /// oldest first
    pub fn update(&mut self, series: &FocusSeries) -> Vec<Action> {
        let values: Vec<f64> = series.values().iter().copied().collect();
        let candidates = self.detector.find_peaks(&values);

        let mut actions = Vec::new();
        for index in candidates {
            let Some(&timestamp) = series.times().get(index) else {
                continue;
            };
            if let Some(action) = self.consider(timestamp) {
                actions.push(action);
            }
        }
        actions
    }

    /// Apply one candidate peak at `timestamp`
    pub fn consider(&mut self, timestamp: f64) -> Option<Action> {
        match &mut self.state {
            PeakState::NoPeakYet => {
                self.state = PeakState::HasPeak {
                    peak_times: vec![timestamp],
                };
                self.position = Position::Initial;
            }
            PeakState::HasPeak { peak_times } => {
                let nearest = peak_times
                    .iter()
                    .map(|t| (timestamp - t).abs())
                    .fold(f64::INFINITY, f64::min);
                if nearest < self.debounce_seconds {
                    trace!(player = self.player, timestamp, nearest, "Candidate peak debounced");
                    return None;
                }
                peak_times.push(timestamp);
                self.position = self.position.flipped();
            }
        }

        let action = Action {
            player: self.player,
            direction: self.axis.direction(self.position),
        };
        debug!(player = self.player, timestamp, direction = %action.direction, "Peak confirmed");
        Some(action)
    }

    /// Peak record with times relative to `anchor`
    pub fn snapshot(&self, anchor: f64) -> DecisionSnapshot {
        DecisionSnapshot {
            relative_peak_times: self.state.peak_times().iter().map(|t| t - anchor).collect(),
            position: self.position,
        }
    }

    /// Continue from an earlier session's peak record, re-anchoring its times
    /// at `now`
    pub fn restore(&mut self, snapshot: &DecisionSnapshot, now: f64) {
        if snapshot.relative_peak_times.is_empty() {
            self.reset();
            return;
        }
        self.state = PeakState::HasPeak {
            peak_times: snapshot.relative_peak_times.iter().map(|t| t + now).collect(),
        };
        self.position = snapshot.position;
    }

    /// Forget every recorded peak
    pub fn reset(&mut self) {
        self.state = PeakState::NoPeakYet;
        self.position = Position::Initial;
    }
}
