//! Trained model bundle loader

use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Fitted standard scaler: `(x - mean) / scale` per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Scale a single row. A zero scale leaves the centered value as is.
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&mean, &scale))| {
                let scale = if scale == 0.0 { 1.0 } else { scale };
                (x - mean) / scale
            })
            .collect()
    }
}

/// On-disk layout of the bundle
#[derive(Debug, Deserialize)]
struct BundleFile {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
    scaler: StandardScaler,
}

/// Trained logistic regression with its scaler and feature schema.
///
/// `feature_names` is the single source of truth for column order: the
/// coefficient vector and both scaler vectors are aligned with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    feature_names: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
    scaler: StandardScaler,
}

impl ModelBundle {
    /// Assemble a bundle, checking that every vector matches the schema
    pub fn new(
        feature_names: Vec<String>,
        coefficients: Vec<f64>,
        intercept: f64,
        scaler: StandardScaler,
    ) -> Result<Self> {
        let n = feature_names.len();
        if n == 0 {
            return Err(PipelineError::MalformedBundle(
                "feature schema is empty".to_string(),
            ));
        }

        for (what, len) in [
            ("coefficients", coefficients.len()),
            ("scaler.mean", scaler.mean.len()),
            ("scaler.scale", scaler.scale.len()),
        ] {
            if len != n {
                return Err(PipelineError::MalformedBundle(format!(
                    "{} has {} entries, schema has {} features",
                    what, len, n
                )));
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &feature_names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::MalformedBundle(format!(
                    "duplicate feature '{}' in schema",
                    name
                )));
            }
        }

        let all_finite = coefficients
            .iter()
            .chain(scaler.mean.iter())
            .chain(scaler.scale.iter())
            .all(|v| v.is_finite())
            && intercept.is_finite();
        if !all_finite {
            return Err(PipelineError::MalformedBundle(
                "non-finite parameter".to_string(),
            ));
        }

        Ok(Self {
            feature_names,
            coefficients,
            intercept,
            scaler,
        })
    }

    /// Load a bundle from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        info!(path = %path.display(), "Loading model bundle");

        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle = Self::from_json_str(&raw, &path.display().to_string())?;

        info!(
            features = bundle.len(),
            positive_coefficients = bundle.coefficients.iter().filter(|&&c| c > 0.0).count(),
            "Model bundle loaded successfully"
        );

        Ok(bundle)
    }

    /// Parse a bundle from JSON text
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self> {
        let file: BundleFile = serde_json::from_str(json).map_err(|source| PipelineError::Json {
            origin: origin.to_string(),
            source,
        })?;

        Self::new(
            file.feature_names,
            file.coefficients,
            file.intercept,
            file.scaler,
        )
    }

    /// Trained feature schema, in column order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Number of features in the schema
    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "feature_names": ["loan_amnt", "dti", "term_60 months"],
        "coefficients": [0.2, 0.5, -0.1],
        "intercept": -1.0,
        "scaler": {"mean": [15000.0, 18.0, 0.3], "scale": [8000.0, 8.0, 0.45]}
    }"#;

    #[test]
    fn test_parse_bundle() {
        let bundle = ModelBundle::from_json_str(BUNDLE, "test").unwrap();

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.feature_names()[2], "term_60 months");
        assert_eq!(bundle.coefficients(), &[0.2, 0.5, -0.1]);
        assert_eq!(bundle.intercept(), -1.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = ModelBundle::new(
            vec!["a".to_string(), "b".to_string()],
            vec![1.0],
            0.0,
            StandardScaler {
                mean: vec![0.0, 0.0],
                scale: vec![1.0, 1.0],
            },
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedBundle(_)));
        assert!(err.is_service_unavailable());
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let err = ModelBundle::new(
            vec!["a".to_string(), "a".to_string()],
            vec![1.0, 2.0],
            0.0,
            StandardScaler {
                mean: vec![0.0, 0.0],
                scale: vec![1.0, 1.0],
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("duplicate feature 'a'"));
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 5.0, 2.0],
            scale: vec![2.0, 0.0, 4.0],
        };

        assert_eq!(scaler.transform(&[14.0, 7.0, 0.0]), vec![2.0, 2.0, -0.5]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelBundle::load("/nonexistent/model_bundle.json").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
