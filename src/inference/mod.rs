//! Classifier boundary.
//!
//! A feature vector goes through three externally fitted stages: a scaler,
//! a dimensionality reducer and a binary model. The pipeline only depends on
//! the three narrow traits below, so any fitted object honoring them can be
//! plugged in. [`InferenceContext`] owns one of each for the lifetime of the
//! process and is never reloaded.

pub mod artifacts;

pub use artifacts::{Kernel, LinearReducer, StandardScaler, SvmModel};

use crate::config::ModelPaths;
use crate::core::features::FeatureVector;
use crate::core::label::Label;
use std::path::PathBuf;

/// Feature scaling fitted at training time.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

/// Dimensionality reduction fitted at training time.
pub trait FeatureReducer: Send + Sync {
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>, InferenceError>;
}

/// Binary model producing a class code (0 = closed, 1 = open).
pub trait DoorModel: Send + Sync {
    fn predict(&self, input: &[f64]) -> Result<u8, InferenceError>;
}

/// Inference errors.
#[derive(Debug)]
pub enum InferenceError {
    /// Input length does not match what the stage was fitted on
    Dimension {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The model returned a code with no label
    UnknownClass(u8),
    /// An artifact file could not be loaded
    Artifact { path: PathBuf, message: String },
    /// An artifact loaded but its contents are inconsistent
    Invalid(String),
}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceError::Dimension {
                stage,
                expected,
                actual,
            } => write!(f, "{stage} expects {expected} inputs, got {actual}"),
            InferenceError::UnknownClass(code) => write!(f, "Model returned unknown class {code}"),
            InferenceError::Artifact { path, message } => {
                write!(f, "Could not load artifact {path:?}: {message}")
            }
            InferenceError::Invalid(msg) => write!(f, "Invalid artifact: {msg}"),
        }
    }
}

impl std::error::Error for InferenceError {}

/// The fitted scaler, reducer and model, applied in that order.
pub struct InferenceContext {
    scaler: Box<dyn FeatureScaler>,
    reducer: Box<dyn FeatureReducer>,
    model: Box<dyn DoorModel>,
}

impl InferenceContext {
    pub fn new(
        scaler: Box<dyn FeatureScaler>,
        reducer: Box<dyn FeatureReducer>,
        model: Box<dyn DoorModel>,
    ) -> Self {
        Self {
            scaler,
            reducer,
            model,
        }
    }

    /// Load the three JSON artifacts named in the configuration.
    pub fn load(paths: &ModelPaths) -> Result<Self, InferenceError> {
        let scaler = StandardScaler::load(&paths.scaler)?;
        let reducer = LinearReducer::load(&paths.reducer)?;
        let model = SvmModel::load(&paths.model)?;

        tracing::info!(
            features = scaler.dimension(),
            components = reducer.components(),
            support_vectors = model.support_vector_count(),
            "Loaded classifier artifacts"
        );

        Ok(Self::new(Box::new(scaler), Box::new(reducer), Box::new(model)))
    }

    /// Classify one feature vector.
    pub fn classify(&self, features: &FeatureVector) -> Result<Label, InferenceError> {
        let scaled = self.scaler.transform(features.as_slice())?;
        let reduced = self.reducer.transform(&scaled)?;
        let code = self.model.predict(&reduced)?;
        match Label::from_code(code) {
            Some(label @ (Label::Open | Label::Closed)) => Ok(label),
            _ => Err(InferenceError::UnknownClass(code)),
        }
    }
}
