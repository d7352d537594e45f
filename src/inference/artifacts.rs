//! JSON-persisted classifier artifacts.
//!
//! The file formats mirror the fitted attributes of the usual scaler /
//! discriminant / SVM trio so a training script can dump them directly:
//!
//! ```json
//! // scaler.json
//! { "mean": [..18], "scale": [..18] }
//! // reducer.json: scalings has one row per input feature
//! { "xbar": [..18], "scalings": [[..], ..], "n_components": 1 }
//! // model.json
//! { "kernel": { "type": "rbf", "gamma": 0.5 },
//!   "support_vectors": [[..], ..], "dual_coef": [..], "intercept": 0.1,
//!   "classes": [0, 1] }
//! ```

use crate::inference::{DoorModel, FeatureReducer, FeatureScaler, InferenceError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, InferenceError> {
    let artifact_err = |message: String| InferenceError::Artifact {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| artifact_err(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| artifact_err(e.to_string()))
}

fn check_len(stage: &'static str, expected: usize, input: &[f64]) -> Result<(), InferenceError> {
    if input.len() != expected {
        return Err(InferenceError::Dimension {
            stage,
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}

/// Standardization: `(x - mean) / scale`, with a zero scale treated as 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, InferenceError> {
        if mean.len() != scale.len() || mean.is_empty() {
            return Err(InferenceError::Invalid(format!(
                "scaler has {} means and {} scales",
                mean.len(),
                scale.len()
            )));
        }
        Ok(Self { mean, scale })
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw: StandardScaler = load_json(path)?;
        Self::new(raw.mean, raw.scale)
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>, InferenceError> {
        check_len("scaler", self.mean.len(), input)?;
        Ok(input
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }
}

/// Linear projection: `(x - xbar) . scalings[:, ..n_components]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearReducer {
    pub xbar: Vec<f64>,
    pub scalings: Vec<Vec<f64>>,
    #[serde(default)]
    pub n_components: Option<usize>,
}

impl LinearReducer {
    pub fn new(
        xbar: Vec<f64>,
        scalings: Vec<Vec<f64>>,
        n_components: Option<usize>,
    ) -> Result<Self, InferenceError> {
        if scalings.len() != xbar.len() || xbar.is_empty() {
            return Err(InferenceError::Invalid(format!(
                "reducer has {} centers but {} scaling rows",
                xbar.len(),
                scalings.len()
            )));
        }
        let width = scalings[0].len();
        if width == 0 || scalings.iter().any(|row| row.len() != width) {
            return Err(InferenceError::Invalid(
                "reducer scaling rows must share one non-zero width".to_string(),
            ));
        }
        if n_components.is_some_and(|k| k == 0 || k > width) {
            return Err(InferenceError::Invalid(format!(
                "reducer cannot keep {n_components:?} of {width} components"
            )));
        }
        Ok(Self {
            xbar,
            scalings,
            n_components,
        })
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw: LinearReducer = load_json(path)?;
        Self::new(raw.xbar, raw.scalings, raw.n_components)
    }

    /// Output dimension.
    pub fn components(&self) -> usize {
        self.n_components
            .unwrap_or_else(|| self.scalings.first().map_or(0, Vec::len))
    }
}

impl FeatureReducer for LinearReducer {
    fn transform(&self, input: &[f64]) -> Result<Vec<f64>, InferenceError> {
        check_len("reducer", self.xbar.len(), input)?;
        let mut out = vec![0.0; self.components()];
        for ((x, center), row) in input.iter().zip(&self.xbar).zip(&self.scalings) {
            let centered = x - center;
            for (acc, weight) in out.iter_mut().zip(row) {
                *acc += centered * weight;
            }
        }
        Ok(out)
    }
}

/// Kernel of a support vector model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
}

impl Kernel {
    fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Kernel::Linear => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Kernel::Rbf { gamma } => {
                let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * dist).exp()
            }
        }
    }
}

/// Binary support vector classifier.
///
/// Predicts `classes[1]` when the decision value is positive, `classes[0]`
/// otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModel {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_classes")]
    pub classes: [u8; 2],
}

fn default_classes() -> [u8; 2] {
    [0, 1]
}

impl SvmModel {
    pub fn new(
        kernel: Kernel,
        support_vectors: Vec<Vec<f64>>,
        dual_coef: Vec<f64>,
        intercept: f64,
        classes: [u8; 2],
    ) -> Result<Self, InferenceError> {
        if support_vectors.is_empty() || support_vectors.len() != dual_coef.len() {
            return Err(InferenceError::Invalid(format!(
                "model has {} support vectors and {} coefficients",
                support_vectors.len(),
                dual_coef.len()
            )));
        }
        let dim = support_vectors[0].len();
        if dim == 0 || support_vectors.iter().any(|sv| sv.len() != dim) {
            return Err(InferenceError::Invalid(
                "support vectors must share one non-zero dimension".to_string(),
            ));
        }
        Ok(Self {
            kernel,
            support_vectors,
            dual_coef,
            intercept,
            classes,
        })
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw: SvmModel = load_json(path)?;
        Self::new(
            raw.kernel,
            raw.support_vectors,
            raw.dual_coef,
            raw.intercept,
            raw.classes,
        )
    }

    pub fn support_vector_count(&self) -> usize {
        self.support_vectors.len()
    }

    /// Signed distance-like score; positive favors `classes[1]`.
    pub fn decision(&self, input: &[f64]) -> Result<f64, InferenceError> {
        let dim = self.support_vectors.first().map_or(0, Vec::len);
        check_len("model", dim, input)?;
        Ok(self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * self.kernel.eval(sv, input))
            .sum::<f64>()
            + self.intercept)
    }
}

impl DoorModel for SvmModel {
    fn predict(&self, input: &[f64]) -> Result<u8, InferenceError> {
        let decision = self.decision(input)?;
        Ok(if decision > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_zero_scale_is_one() {
        let scaler = StandardScaler::new(vec![1.0, 2.0], vec![2.0, 0.0]).unwrap();
        assert_eq!(scaler.transform(&[3.0, 5.0]).unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_scaler_dimension_mismatch() {
        let scaler = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(InferenceError::Dimension {
                stage: "scaler",
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_reducer_projection() {
        let reducer = LinearReducer::new(
            vec![1.0, 1.0],
            vec![vec![1.0, 0.0], vec![2.0, 1.0]],
            Some(1),
        )
        .unwrap();
        assert_eq!(reducer.components(), 1);
        // (2-1)*1 + (3-1)*2 = 5
        assert_eq!(reducer.transform(&[2.0, 3.0]).unwrap(), vec![5.0]);
    }

    #[test]
    fn test_reducer_rejects_ragged_rows() {
        let result = LinearReducer::new(vec![0.0, 0.0], vec![vec![1.0], vec![1.0, 2.0]], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_rbf_svm_predicts_nearest_side() {
        let model = SvmModel::new(
            Kernel::Rbf { gamma: 1.0 },
            vec![vec![-1.0], vec![1.0]],
            vec![-1.0, 1.0],
            0.0,
            [0, 1],
        )
        .unwrap();
        assert_eq!(model.predict(&[0.9]).unwrap(), 1);
        assert_eq!(model.predict(&[-0.9]).unwrap(), 0);
    }

    #[test]
    fn test_linear_svm_intercept() {
        let model =
            SvmModel::new(Kernel::Linear, vec![vec![1.0]], vec![1.0], -2.0, [0, 1]).unwrap();
        assert_eq!(model.predict(&[1.5]).unwrap(), 0);
        assert_eq!(model.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn test_model_json_format() {
        let json = r#"{
            "kernel": { "type": "rbf", "gamma": 0.5 },
            "support_vectors": [[0.0], [1.0]],
            "dual_coef": [-0.5, 0.5],
            "intercept": 0.0
        }"#;
        let raw: SvmModel = serde_json::from_str(json).unwrap();
        assert_eq!(raw.kernel, Kernel::Rbf { gamma: 0.5 });
        assert_eq!(raw.classes, [0, 1]);
    }

    #[test]
    fn test_unvalidated_empty_artifacts_do_not_panic() {
        let reducer = LinearReducer {
            xbar: Vec::new(),
            scalings: Vec::new(),
            n_components: None,
        };
        assert_eq!(reducer.components(), 0);
        assert!(matches!(
            reducer.transform(&[1.0]),
            Err(InferenceError::Dimension { stage: "reducer", .. })
        ));

        let json = r#"{
            "kernel": { "type": "linear" },
            "support_vectors": [],
            "dual_coef": [],
            "intercept": 0.0
        }"#;
        let model: SvmModel = serde_json::from_str(json).unwrap();
        assert!(matches!(
            model.predict(&[1.0]),
            Err(InferenceError::Dimension {
                stage: "model",
                expected: 0,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = StandardScaler::load(Path::new("/nonexistent/scaler.json"));
        assert!(matches!(result, Err(InferenceError::Artifact { .. })));
    }
}
