// src/processing/mod.rs
//! Signal processing pipeline: filtering, band power, focus and decisions

pub mod band_power;
pub mod decision;
pub mod filters;
pub mod focus;
pub mod game_loop;
#[cfg(feature = "onnx")]
pub mod onnx_model;
pub mod signal_filter;

pub use band_power::{BandPowerExtractor, BandPowers, PowerSpectrum};
pub use decision::{DecisionEngine, DecisionSnapshot, PeakDetector, PeakState};
pub use focus::{
    build_model, FeatureVector, FocusClassifier, FocusModel, FocusSeries, FocusSnapshot, LogisticFocusModel,
    ModelHandle,
};
pub use game_loop::{CarryOver, FocusTrace, GameLoop, LoopMetrics, PlayerTick, TickResult, TimeSeries};
pub use signal_filter::SignalFilter;
