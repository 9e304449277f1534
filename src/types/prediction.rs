//! Prediction result data structures

use crate::types::application::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scores strictly below this are approved.
pub const APPROVE_BELOW: f64 = 0.40;

/// Scores strictly above this are rejected.
pub const REJECT_ABOVE: f64 = 0.65;

/// Risk tier classification of a PD score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Determine risk tier from a PD score
    pub fn from_score(pd_score: f64) -> Self {
        if pd_score < APPROVE_BELOW {
            RiskTier::Low
        } else if pd_score <= REJECT_ABOVE {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credit decision derived from a PD score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Review,
    Reject,
}

impl Decision {
    /// Determine decision from a PD score. Uses the same bands as
    /// [`RiskTier::from_score`].
    pub fn from_score(pd_score: f64) -> Self {
        if pd_score < APPROVE_BELOW {
            Decision::Approve
        } else if pd_score <= REJECT_ABOVE {
            Decision::Review
        } else {
            Decision::Reject
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored loan application, serialized as the response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Probability of default (0.0 - 1.0)
    pub pd_score: f64,

    /// low / medium / high
    pub risk_tier: RiskTier,

    /// approve / review / reject
    pub decision: Decision,

    /// True if fico_range_low < 660
    pub fico_warning: bool,

    /// Humanized names of the model's strongest risk drivers
    pub top_risk_factors: Vec<String>,

    /// Macro values used for this prediction
    pub unemployment_rate: f64,
    pub delinq_rate: f64,

    /// Bureau fields imputed from the FICO tier
    pub imputed_fields: BTreeMap<String, FieldValue>,
}
