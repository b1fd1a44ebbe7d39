// src/processing/game_loop.rs
//! Per-tick orchestration of the focus pipeline
//!
//! One tick pulls the newest board columns, merges them into the channel
//! window, filters a copy of the window, and runs band power, focus and
//! decision for every player pipeline. Game mode runs one pipeline per
//! player over that player's channels; analysis mode runs a single pipeline
//! over every active channel.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::acquisition::ChannelBuffer;
use crate::actuation::Action;
use crate::config::constants::bands::BAND_COUNT;
use crate::config::{GameMode, SystemConfig};
use crate::error::{GameError, GameResult};
use crate::hal::{BoardDescriptor, BoardSource, Frame};
use crate::processing::band_power::BandPowerExtractor;
use crate::processing::decision::{DecisionEngine, DecisionSnapshot};
use crate::processing::focus::{FocusClassifier, FocusSnapshot, ModelHandle};
use crate::processing::signal_filter::SignalFilter;
use crate::utils::time::TimeProvider;

/// Filtered voltages of a player's channels with their sample times
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    /// One row per channel, in the order of [`PlayerTick::channels`]
    pub voltage: Vec<Vec<f64>>,
}

/// Focus history with times relative to the newest estimate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FocusTrace {
    pub relative_time: Vec<f64>,
    pub value: Vec<f64>,
}

/// One player's share of a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerTick {
    pub player: usize,
    pub channels: Vec<usize>,
    pub time_series: TimeSeries,
    /// Smoothed band power: delta, theta, alpha, beta, gamma
    pub band_power: [f64; BAND_COUNT],
    pub focus: f64,
    pub focus_metric: FocusTrace,
}

/// Everything a consumer needs from one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickResult {
    /// Board timestamp of the newest sample in the window
    pub timestamp: f64,
    pub fresh_samples: usize,
    pub players: Vec<PlayerTick>,
    pub actions: Vec<Action>,
}

impl TickResult {
    /// JSON payload for display consumers
    pub fn to_json(&self) -> GameResult<String> {
        serde_json::to_string(self).map_err(|e| GameError::Lifecycle {
            resource: "tick_result".to_string(),
            reason: e.to_string(),
        })
    }
}

/// State kept across a stop so the next start can resume
#[derive(Debug, Clone, Default)]
pub struct CarryOver {
    pub window: Option<Frame>,
    pub focus: Vec<FocusSnapshot>,
    /// Peak records, anchored like the matching focus snapshot
    pub decisions: Vec<DecisionSnapshot>,
}

#[derive(Debug, Default, Clone)]
pub struct LoopMetrics {
    pub ticks_processed: u64,
    pub idle_ticks: u64,
    pub actions_emitted: u64,
    pub average_tick_time_us: f64,
    pub max_tick_time_us: f64,
}

struct PlayerPipeline {
    player: usize,
    channels: Vec<usize>,
    band_power: BandPowerExtractor,
    classifier: FocusClassifier,
    decision: DecisionEngine,
}

pub struct GameLoop {
    mode: GameMode,
    descriptor: BoardDescriptor,
    buffer: ChannelBuffer,
    filter: SignalFilter,
    active_rows: Vec<usize>,
    players: Vec<PlayerPipeline>,
    time_provider: Arc<dyn TimeProvider>,
    metrics: LoopMetrics,
}

impl GameLoop {
    /// Build a loop for `descriptor`. With a carry-over the window, the focus
    /// histories and the peak records continue where the previous run
    /// stopped.
    pub fn new(
        config: &SystemConfig,
        descriptor: &BoardDescriptor,
        carry_over: Option<&CarryOver>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> GameResult<Self> {
        config
            .validate_for_board(descriptor)
            .map_err(|errors| GameError::configuration("session", errors.join("; ")))?;

        let rate = descriptor.sampling_rate_hz;
        let window_samples = config.session.window_samples(rate);
        let buffer = match carry_over.and_then(|c| c.window.as_ref()) {
            Some(window) if window.dim() == (descriptor.row_count, window_samples) => {
                ChannelBuffer::from_window(window.clone(), descriptor.timestamp_row)?
            }
            Some(_) => {
                debug!("Carried-over window does not match the board layout, starting empty");
                ChannelBuffer::new(descriptor.row_count, window_samples, descriptor.timestamp_row)?
            }
            None => ChannelBuffer::new(descriptor.row_count, window_samples, descriptor.timestamp_row)?,
        };

        let now = time_provider.now_secs();
        let processing = &config.processing;
        let players = config
            .session
            .pipeline_channels()
            .into_iter()
            .enumerate()
            .map(|(player, channels)| {
                let classifier = match carry_over.and_then(|c| c.focus.get(player)) {
                    Some(snapshot) => FocusClassifier::warm(window_samples, snapshot, now),
                    None => FocusClassifier::new(window_samples),
                };
                let mut decision = DecisionEngine::new(player, &processing.decision, rate);
                if let Some(snapshot) = carry_over.and_then(|c| c.decisions.get(player)) {
                    decision.restore(snapshot, now);
                }
                PlayerPipeline {
                    player,
                    channels,
                    band_power: BandPowerExtractor::new(rate, processing.band_power_history),
                    classifier,
                    decision,
                }
            })
            .collect();

        Ok(Self {
            mode: config.session.game_mode,
            descriptor: descriptor.clone(),
            buffer,
            filter: SignalFilter::new(&processing.filter, rate)?,
            active_rows: config.session.active_channels.clone(),
            players,
            time_provider,
            metrics: LoopMetrics::default(),
        })
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn window(&self) -> &Frame {
        self.buffer.window()
    }

    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }

    /// Run one tick. Returns `Ok(None)` when the board had no sample newer
    /// than the window.
    ///
    /// Board failures come back as acquisition errors; everything after the
    /// pull fails with a processing error and leaves the tick unpublished.
    pub fn tick(&mut self, board: &mut dyn BoardSource, model: &mut ModelHandle) -> GameResult<Option<TickResult>> {
        let start = self.time_provider.now_nanos();

        let batch = board.get_current_board_data(self.buffer.window_samples())?;
        let fresh_samples = self.buffer.merge_fresh(&batch)?;
        if fresh_samples == 0 {
            self.metrics.idle_ticks += 1;
            return Ok(None);
        }

        let mut filtered = self.buffer.window().clone();
        self.filter.apply(&mut filtered, &self.active_rows)?;

        let timestamp = self.buffer.latest_timestamp();
        let times = filtered.row(self.descriptor.timestamp_row).to_vec();

        // Every fallible stage runs for all players before any history or peak
        // record changes, so a failed tick leaves no partial state behind
        let mut estimates = Vec::with_capacity(self.players.len());
        for pipeline in &mut self.players {
            let powers = pipeline.band_power.compute(&filtered, &pipeline.channels)?;
            let focus = FocusClassifier::evaluate(model, &powers.feature_vector())?;
            estimates.push((powers, focus));
        }

        let mut players = Vec::with_capacity(self.players.len());
        let mut actions = Vec::new();
        for (pipeline, (powers, focus)) in self.players.iter_mut().zip(estimates) {
            let smoothed = pipeline.band_power.record(powers.mean);
            pipeline.classifier.record(focus, timestamp);
            let emitted = pipeline.decision.update(pipeline.classifier.series());
            for action in &emitted {
                debug!(player = action.player, direction = %action.direction, "Action emitted");
            }
            actions.extend(emitted);

            let series = pipeline.classifier.series();
            players.push(PlayerTick {
                player: pipeline.player,
                channels: pipeline.channels.clone(),
                time_series: TimeSeries {
                    time: times.clone(),
                    voltage: pipeline.channels.iter().map(|&ch| filtered.row(ch).to_vec()).collect(),
                },
                band_power: smoothed,
                focus,
                focus_metric: FocusTrace {
                    relative_time: series.relative_times(),
                    value: series.values().iter().copied().collect(),
                },
            });
        }

        let elapsed_us = self.time_provider.now_nanos().saturating_sub(start) as f64 / 1000.0;
        self.record_tick(elapsed_us, actions.len());
        trace!(fresh_samples, elapsed_us, "Tick complete");

        Ok(Some(TickResult {
            timestamp,
            fresh_samples,
            players,
            actions,
        }))
    }

    /// Snapshot of the window, focus histories and peak records for a warm
    /// restart
    pub fn carry_over(&self) -> CarryOver {
        CarryOver {
            window: Some(self.buffer.window().clone()),
            focus: self.players.iter().map(|p| p.classifier.snapshot()).collect(),
            decisions: self
                .players
                .iter()
                .map(|p| {
                    let anchor = p.classifier.series().latest_time().unwrap_or(0.0);
                    p.decision.snapshot(anchor)
                })
                .collect(),
        }
    }

    fn record_tick(&mut self, elapsed_us: f64, actions: usize) {
        let m = &mut self.metrics;
        m.ticks_processed += 1;
        m.actions_emitted += actions as u64;
        let n = m.ticks_processed as f64;
        m.average_tick_time_us = (m.average_tick_time_us * (n - 1.0) + elapsed_us) / n;
        if elapsed_us > m.max_tick_time_us {
            m.max_tick_time_us = elapsed_us;
        }
    }
}
