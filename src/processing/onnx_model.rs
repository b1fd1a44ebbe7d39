// src/processing/onnx_model.rs
//! ONNX Runtime backed focus model

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::PathBuf;

use crate::config::constants::bands::FEATURE_VECTOR_LEN;
use crate::error::{GameErrorBuilder, GameResult};
use crate::processing::focus::{FeatureVector, FocusModel};

/// Regression model with one `[1, 10]` float input and one scalar output
pub struct OnnxFocusModel {
    path: PathBuf,
    session: Option<Session>,
}

impl OnnxFocusModel {
    pub fn new(path: PathBuf) -> Self {
        Self { path, session: None }
    }
}

impl FocusModel for OnnxFocusModel {
    fn name(&self) -> &str {
        "onnx"
    }

    fn prepare(&mut self) -> GameResult<()> {
        let errors = || GameErrorBuilder::new("onnx", "prepare");
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(&self.path))
            .map_err(|e| errors().model(&format!("{}: {}", self.path.display(), e)))?;
        self.session = Some(session);
        Ok(())
    }

    fn predict(&mut self, features: &FeatureVector) -> GameResult<f64> {
        let errors = || GameErrorBuilder::new("onnx", "predict");
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| errors().model("model is not prepared"))?;

        let input: Vec<f32> = features.iter().map(|f| *f as f32).collect();
        let tensor = Tensor::from_array(([1usize, FEATURE_VECTOR_LEN], input))
            .map_err(|e| errors().model(&e.to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| errors().model(&e.to_string()))?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| errors().model(&e.to_string()))?;
        data.first()
            .map(|v| *v as f64)
            .ok_or_else(|| errors().model("model produced no output"))
    }

    fn release(&mut self) -> GameResult<()> {
        self.session = None;
        Ok(())
    }
}
