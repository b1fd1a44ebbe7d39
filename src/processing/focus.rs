// src/processing/focus.rs
//! Focus estimation: regression model lifecycle and per-player focus history

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::config::constants::bands::FEATURE_VECTOR_LEN;
use crate::config::{ModelConfig, ModelKind};
use crate::error::{GameError, GameErrorBuilder, GameResult, ProcessingStage};

/// Feature vector handed to the model: five band power means followed by
/// the five across-channel variances
pub type FeatureVector = [f64; FEATURE_VECTOR_LEN];

/// Black-box regression model mapping band power features to focus.
///
/// Implementations are not required to be thread safe; the processing loop
/// is the only caller.
pub trait FocusModel: Send {
    fn name(&self) -> &str;

    /// Load weights or open the backend session
    fn prepare(&mut self) -> GameResult<()>;

    /// Focus estimate, nominally in `[0, 1]`
    fn predict(&mut self, features: &FeatureVector) -> GameResult<f64>;

    /// Free backend resources
    fn release(&mut self) -> GameResult<()>;
}

/// A prepared model that is released exactly once, either explicitly
/// through [`release`](Self::release) or when the handle is dropped.
pub struct ModelHandle {
    model: Box<dyn FocusModel>,
    released: bool,
}

impl ModelHandle {
    /// Prepare `model`; a failed preparation releases nothing and returns the
    /// error
    pub fn prepare(mut model: Box<dyn FocusModel>) -> GameResult<Self> {
        model.prepare()?;
        info!(model = model.name(), "Focus model prepared");
        Ok(Self {
            model,
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn predict(&mut self, features: &FeatureVector) -> GameResult<f64> {
        if self.released {
            return Err(GameErrorBuilder::new(self.model.name(), "predict").invalid_state("model already released"));
        }
        self.model.predict(features)
    }

    /// Release the model now and report the outcome
    pub fn release(mut self) -> GameResult<()> {
        self.release_once()
    }

    fn release_once(&mut self) -> GameResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let result = self.model.release();
        match &result {
            Ok(()) => info!(model = self.model.name(), "Focus model released"),
            Err(e) => warn!(model = self.model.name(), error = %e, "Focus model release failed"),
        }
        result
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        // Errors are already logged by release_once
        let _ = self.release_once();
    }
}

/// Logistic regression over the feature vector
#[derive(Debug, Clone)]
pub struct LogisticFocusModel {
    weights: FeatureVector,
    intercept: f64,
    prepared: bool,
}

impl LogisticFocusModel {
    /// Built-in weights: beta and gamma raise focus, delta, theta and alpha
    /// lower it, and spread between channels counts against it
    pub const DEFAULT_WEIGHTS: FeatureVector = [-2.0, -3.0, -4.0, 6.0, 3.0, -1.0, -1.0, -1.0, -1.0, -1.0];
    pub const DEFAULT_INTERCEPT: f64 = 0.5;

    pub fn new(weights: FeatureVector, intercept: f64) -> Self {
        Self {
            weights,
            intercept,
            prepared: false,
        }
    }

    pub fn from_config(config: &ModelConfig) -> GameResult<Self> {
        let weights = match &config.weights {
            None => Self::DEFAULT_WEIGHTS,
            Some(w) => w.as_slice().try_into().map_err(|_| {
                GameError::configuration(
                    "model",
                    format!("logistic model needs {} weights, got {}", FEATURE_VECTOR_LEN, w.len()),
                )
            })?,
        };
        Ok(Self::new(weights, config.intercept.unwrap_or(Self::DEFAULT_INTERCEPT)))
    }
}

impl Default for LogisticFocusModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WEIGHTS, Self::DEFAULT_INTERCEPT)
    }
}

impl FocusModel for LogisticFocusModel {
    fn name(&self) -> &str {
        "logistic"
    }

    fn prepare(&mut self) -> GameResult<()> {
        if self.weights.iter().any(|w| !w.is_finite()) || !self.intercept.is_finite() {
            return Err(GameErrorBuilder::new("logistic", "prepare").model("non-finite coefficients"));
        }
        self.prepared = true;
        Ok(())
    }

    fn predict(&mut self, features: &FeatureVector) -> GameResult<f64> {
        if !self.prepared {
            return Err(GameErrorBuilder::new("logistic", "predict").model("model is not prepared"));
        }
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn release(&mut self) -> GameResult<()> {
        self.prepared = false;
        Ok(())
    }
}

/// Build the configured model, unprepared
pub fn build_model(config: &ModelConfig) -> GameResult<Box<dyn FocusModel>> {
    match config.kind {
        ModelKind::Logistic => Ok(Box::new(LogisticFocusModel::from_config(config)?)),
        #[cfg(feature = "onnx")]
        ModelKind::Onnx => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| GameError::configuration("model", "ONNX model requires a model path"))?;
            Ok(Box::new(crate::processing::onnx_model::OnnxFocusModel::new(path)))
        }
        #[cfg(not(feature = "onnx"))]
        ModelKind::Onnx => Err(GameError::configuration(
            "model",
            "ONNX models need the `onnx` feature",
        )),
    }
}

/// Focus history carried across a restart, with times relative to the
/// newest entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusSnapshot {
    pub relative_times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Bounded, time-stamped focus history of one player
#[derive(Debug, Clone)]
pub struct FocusSeries {
    values: VecDeque<f64>,
    times: VecDeque<f64>,
    capacity: usize,
}

impl FocusSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            times: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild a history from a snapshot, re-anchoring its times at `now`
    pub fn from_snapshot(capacity: usize, snapshot: &FocusSnapshot, now: f64) -> Self {
        let mut series = Self::new(capacity);
        for (t, v) in snapshot.relative_times.iter().zip(&snapshot.values) {
            series.push(*v, t + now);
        }
        series
    }

    pub fn push(&mut self, value: f64, timestamp: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
            self.times.pop_front();
        }
        self.values.push_back(value);
        self.times.push_back(timestamp);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn values(&self) -> &VecDeque<f64> {
        &self.values
    }

    pub fn times(&self) -> &VecDeque<f64> {
        &self.times
    }

    pub fn latest_time(&self) -> Option<f64> {
        self.times.back().copied()
    }

    /// Times relative to the newest entry (all `<= 0`)
    pub fn relative_times(&self) -> Vec<f64> {
        let latest = self.latest_time().unwrap_or(0.0);
        self.times.iter().map(|t| t - latest).collect()
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            relative_times: self.relative_times(),
            values: self.values.iter().copied().collect(),
        }
    }
}

/// Per-player focus estimator
#[derive(Debug, Clone)]
pub struct FocusClassifier {
    series: FocusSeries,
}

impl FocusClassifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: FocusSeries::new(capacity),
        }
    }

    /// Continue from an earlier session's history
    pub fn warm(capacity: usize, previous: &FocusSnapshot, now: f64) -> Self {
        Self {
            series: FocusSeries::from_snapshot(capacity, previous, now),
        }
    }

    /// Predict focus for `features`, record it at `sample_timestamp` and
    /// return the value
    pub fn predict(
        &mut self,
        model: &mut ModelHandle,
        features: &FeatureVector,
        sample_timestamp: f64,
    ) -> GameResult<f64> {
        let metric = Self::evaluate(model, features)?;
        self.record(metric, sample_timestamp);
        Ok(metric)
    }

    /// Run the model without touching the history. Model failures stay model
    /// errors; a non-finite output is a classification error.
    pub fn evaluate(model: &mut ModelHandle, features: &FeatureVector) -> GameResult<f64> {
        let metric = model.predict(features).map_err(|e| match e {
            GameError::Model { .. } => e,
            other => GameError::processing(ProcessingStage::Classification, other.to_string()),
        })?;
        if !metric.is_finite() {
            return Err(GameError::processing(
                ProcessingStage::Classification,
                format!("model returned {}", metric),
            ));
        }
        if !(0.0..=1.0).contains(&metric) {
            debug!(metric, "Focus metric outside [0, 1]");
        }
        Ok(metric)
    }

    /// Append an evaluated metric to the history
    pub fn record(&mut self, metric: f64, sample_timestamp: f64) {
        self.series.push(metric, sample_timestamp);
    }

    pub fn series(&self) -> &FocusSeries {
        &self.series
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        self.series.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingModel {
        releases: Arc<AtomicUsize>,
        fail_prepare: bool,
    }

    impl FocusModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }
        fn prepare(&mut self) -> GameResult<()> {
            if self.fail_prepare {
                return Err(GameErrorBuilder::new("counting", "prepare").model("backend missing"));
            }
            Ok(())
        }
        fn predict(&mut self, features: &FeatureVector) -> GameResult<f64> {
            Ok(features[0])
        }
        fn release(&mut self) -> GameResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting(fail_prepare: bool) -> (Box<dyn FocusModel>, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let model = CountingModel {
            releases: releases.clone(),
            fail_prepare,
        };
        (Box::new(model), releases)
    }

    #[test]
    fn test_handle_releases_once_on_drop() {
        let (model, releases) = counting(false);
        {
            let mut handle = ModelHandle::prepare(model).unwrap();
            assert_eq!(handle.predict(&[0.3; FEATURE_VECTOR_LEN]).unwrap(), 0.3);
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_release_is_not_repeated() {
        let (model, releases) = counting(false);
        let handle = ModelHandle::prepare(model).unwrap();
        handle.release().unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_prepare_is_model_error() {
        let (model, releases) = counting(true);
        let err = ModelHandle::prepare(model).err().unwrap();
        assert!(matches!(err, GameError::Model { .. }));
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_logistic_model() {
        let mut model = LogisticFocusModel::new([0.0; FEATURE_VECTOR_LEN], 0.0);
        assert!(model.predict(&[0.0; FEATURE_VECTOR_LEN]).is_err());
        model.prepare().unwrap();
        assert!((model.predict(&[1.0; FEATURE_VECTOR_LEN]).unwrap() - 0.5).abs() < 1e-12);

        let mut model = LogisticFocusModel::default();
        model.prepare().unwrap();
        let beta = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let alpha = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(model.predict(&beta).unwrap() > model.predict(&alpha).unwrap());
    }

    #[test]
    fn test_build_model_from_config() {
        let config = ModelConfig {
            weights: Some(vec![0.5; FEATURE_VECTOR_LEN]),
            intercept: Some(-1.0),
            ..ModelConfig::default()
        };
        let model = build_model(&config).unwrap();
        assert_eq!(model.name(), "logistic");

        let bad = ModelConfig {
            weights: Some(vec![0.5; 3]),
            ..ModelConfig::default()
        };
        assert!(build_model(&bad).is_err());
    }

    #[test]
    fn test_series_is_bounded() {
        let mut series = FocusSeries::new(3);
        for i in 0..5 {
            series.push(i as f64 / 10.0, 100.0 + i as f64);
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.values().iter().copied().collect::<Vec<_>>(), vec![0.2, 0.3, 0.4]);
        assert_eq!(series.relative_times(), vec![-2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_classifier_records_prediction() {
        let (model, _) = counting(false);
        let mut handle = ModelHandle::prepare(model).unwrap();
        let mut classifier = FocusClassifier::new(10);

        let mut features = [0.0; FEATURE_VECTOR_LEN];
        features[0] = 0.7;
        let metric = classifier.predict(&mut handle, &features, 12.5).unwrap();
        assert_eq!(metric, 0.7);
        assert_eq!(classifier.series().latest_time(), Some(12.5));

        features[0] = f64::NAN;
        let err = classifier.predict(&mut handle, &features, 13.0).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(classifier.series().len(), 1);
    }

    #[test]
    fn test_out_of_range_output_kept_unclamped() {
        let (model, _) = counting(false);
        let mut handle = ModelHandle::prepare(model).unwrap();
        let mut classifier = FocusClassifier::new(10);

        let mut features = [0.0; FEATURE_VECTOR_LEN];
        features[0] = 1.4;
        assert_eq!(FocusClassifier::evaluate(&mut handle, &features).unwrap(), 1.4);
        assert!(classifier.series().is_empty());

        features[0] = -0.2;
        assert_eq!(classifier.predict(&mut handle, &features, 1.0).unwrap(), -0.2);
        assert_eq!(classifier.series().values().back(), Some(&-0.2));
    }

    #[test]
    fn test_warm_start_reanchors_times() {
        let mut series = FocusSeries::new(10);
        series.push(0.1, 50.0);
        series.push(0.2, 51.0);
        let snapshot = series.snapshot();
        assert_eq!(snapshot.relative_times, vec![-1.0, 0.0]);

        let classifier = FocusClassifier::warm(10, &snapshot, 1000.0);
        let times: Vec<f64> = classifier.series().times().iter().copied().collect();
        assert_eq!(times, vec![999.0, 1000.0]);
        assert_eq!(classifier.series().values().len(), 2);
    }
}
