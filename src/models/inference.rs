//! Linear model scoring

use crate::feature_extractor::FeatureVector;
use crate::models::loader::ModelBundle;
use crate::{PipelineError, Result};
use std::sync::Arc;
use tracing::debug;

/// Scores aligned feature vectors with a trained bundle.
///
/// Cheap to clone; the bundle is shared.
#[derive(Debug, Clone)]
pub struct Scorer {
    bundle: Arc<ModelBundle>,
}

impl Scorer {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    /// Positive-class (default) probability for one aligned row.
    ///
    /// Fails only when the row length differs from the schema, which means
    /// the vector was not built against this bundle.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        self.predict_proba_values(features.values())
    }

    /// Same as [`Scorer::predict_proba`] on raw values in schema order
    pub fn predict_proba_values(&self, values: &[f64]) -> Result<f64> {
        if values.len() != self.bundle.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.bundle.len(),
                actual: values.len(),
            });
        }

        let scaled = self.bundle.scaler().transform(values);
        let logit = self.bundle.intercept()
            + scaled
                .iter()
                .zip(self.bundle.coefficients())
                .map(|(x, w)| x * w)
                .sum::<f64>();
        let pd_score = sigmoid(logit);

        debug!(logit = logit, pd_score = pd_score, "Linear model scored");

        Ok(pd_score)
    }
}

/// Logistic function, split by sign to avoid overflow in `exp`
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
