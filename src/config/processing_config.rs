// src/config/processing_config.rs
//! Signal processing configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::constants::{bands, decision, filters};

/// Complete processing pipeline configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProcessingConfig {
    #[serde(default = "default_band_power_history")]
    pub band_power_history: usize,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

/// Conditioning applied to active channels before feature extraction
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    pub mains_frequency_hz: f64,
    pub notch_bandwidth_hz: f64,
    pub bandpass_low_hz: f64,
    pub bandpass_high_hz: f64,
    pub order: usize,
}

/// Peak detection and debounce parameters
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DecisionConfig {
    pub min_peak_height: f64,
    pub min_peak_width_samples: usize,
    /// Minimum separation between two confirmed peaks, in samples. Converted
    /// to seconds with the board sampling rate when the session starts.
    pub debounce_samples: usize,
}

/// Which regression model maps features to focus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Logistic,
    Onnx,
}

/// Regression model configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Ten weights for the logistic model; built-in weights when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    /// Model file for the ONNX backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_band_power_history() -> usize {
    bands::DEFAULT_HISTORY_CAPACITY
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            band_power_history: default_band_power_history(),
            filter: FilterConfig::default(),
            decision: DecisionConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mains_frequency_hz: filters::DEFAULT_MAINS_FREQUENCY_HZ,
            notch_bandwidth_hz: filters::DEFAULT_NOTCH_BANDWIDTH_HZ,
            bandpass_low_hz: filters::DEFAULT_BANDPASS_LOW_HZ,
            bandpass_high_hz: filters::DEFAULT_BANDPASS_HIGH_HZ,
            order: filters::DEFAULT_FILTER_ORDER,
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_peak_height: decision::DEFAULT_MIN_PEAK_HEIGHT,
            min_peak_width_samples: decision::DEFAULT_MIN_PEAK_WIDTH_SAMPLES,
            debounce_samples: decision::DEFAULT_DEBOUNCE_SAMPLES,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Logistic,
            weights: None,
            intercept: None,
            path: None,
        }
    }
}

/// Validate processing configuration
pub fn validate_processing_config(config: &ProcessingConfig) -> Result<(), String> {
    let filter = &config.filter;
    if filter.bandpass_low_hz <= 0.0 {
        return Err("Band-pass low cutoff must be positive".to_string());
    }
    if filter.bandpass_high_hz <= filter.bandpass_low_hz {
        return Err("Band-pass high cutoff must be above the low cutoff".to_string());
    }
    if filter.order == 0 || filter.order > filters::MAX_FILTER_ORDER {
        return Err(format!(
            "Filter order must be between 1 and {}",
            filters::MAX_FILTER_ORDER
        ));
    }
    if filter.mains_frequency_hz <= 0.0 {
        return Err("Mains frequency must be positive".to_string());
    }
    if filter.notch_bandwidth_hz <= 0.0 {
        return Err("Notch bandwidth must be positive".to_string());
    }

    if config.band_power_history == 0 {
        return Err("Band power history must hold at least one entry".to_string());
    }

    let decision = &config.decision;
    if decision.min_peak_height <= 0.0 || decision.min_peak_height > 1.0 {
        return Err("Minimum peak height must be in (0, 1]".to_string());
    }
    if decision.min_peak_width_samples == 0 {
        return Err("Minimum peak width must be at least one sample".to_string());
    }

    match config.model.kind {
        ModelKind::Logistic => {
            if let Some(weights) = &config.model.weights {
                if weights.len() != bands::FEATURE_VECTOR_LEN {
                    return Err(format!(
                        "Logistic model needs {} weights, got {}",
                        bands::FEATURE_VECTOR_LEN,
                        weights.len()
                    ));
                }
            }
        }
        ModelKind::Onnx => {
            if config.model.path.is_none() {
                return Err("ONNX model requires a model path".to_string());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessingConfig::default();
        assert!(validate_processing_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_filter_config() {
        let mut config = ProcessingConfig::default();
        config.filter.bandpass_low_hz = 0.0;
        assert!(validate_processing_config(&config).is_err());

        config.filter.bandpass_low_hz = 60.0;
        config.filter.bandpass_high_hz = 50.0;
        assert!(validate_processing_config(&config).is_err());

        let mut config = ProcessingConfig::default();
        config.filter.order = 0;
        assert!(validate_processing_config(&config).is_err());
        config.filter.order = 9;
        assert!(validate_processing_config(&config).is_err());
        config.filter.order = 3;
        assert!(validate_processing_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_decision_config() {
        let mut config = ProcessingConfig::default();
        config.decision.min_peak_height = 1.5;
        assert!(validate_processing_config(&config).is_err());

        let mut config = ProcessingConfig::default();
        config.decision.min_peak_width_samples = 0;
        assert!(validate_processing_config(&config).is_err());
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ProcessingConfig::default();
        config.model.weights = Some(vec![0.1; 3]);
        assert!(validate_processing_config(&config).is_err());

        let mut config = ProcessingConfig::default();
        config.model.kind = ModelKind::Onnx;
        assert!(validate_processing_config(&config).is_err());
        config.model.path = Some(PathBuf::from("focus.onnx"));
        assert!(validate_processing_config(&config).is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ProcessingConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ProcessingConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.filter.bandpass_high_hz, deserialized.filter.bandpass_high_hz);
        assert_eq!(config.decision.debounce_samples, deserialized.decision.debounce_samples);
    }
}
