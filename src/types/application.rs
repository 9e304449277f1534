//! Loan application data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single feature value: numeric or categorical.
///
/// Imputation table entries and applicant fields share this type so the
/// merge step can treat every source uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    /// Categorical level, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A validated consumer loan application.
///
/// Range checks (FICO in [300, 850], positive amount and income,
/// employment length in [0, 40]) happen before a record reaches the
/// pipeline; nothing here re-validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Requested loan amount
    pub loan_amnt: f64,

    /// Loan term ("36 months" or "60 months")
    pub term: String,

    /// Stated loan purpose (e.g. "debt_consolidation")
    pub purpose: String,

    /// Annual income
    pub annual_inc: f64,

    /// Employment length in years
    pub emp_length: f64,

    /// RENT, OWN, MORTGAGE or OTHER
    pub home_ownership: String,

    /// Not Verified, Source Verified or Verified
    pub verification_status: String,

    /// Individual or Joint App
    pub application_type: String,

    /// Two-letter state code
    pub addr_state: String,

    /// Debt-to-income ratio
    pub dti: f64,

    /// Lower bound of the applicant's FICO range
    pub fico_range_low: f64,

    /// Upper bound of the applicant's FICO range
    pub fico_range_high: f64,
}

impl ApplicationRecord {
    /// Applicant fields that feed the model, in input order.
    ///
    /// The FICO range is deliberately absent: the model sees FICO only
    /// through the imputed bureau fields.
    pub fn feature_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("loan_amnt", self.loan_amnt.into()),
            ("term", self.term.as_str().into()),
            ("purpose", self.purpose.as_str().into()),
            ("annual_inc", self.annual_inc.into()),
            ("emp_length", self.emp_length.into()),
            ("home_ownership", self.home_ownership.as_str().into()),
            ("verification_status", self.verification_status.as_str().into()),
            ("application_type", self.application_type.as_str().into()),
            ("addr_state", self.addr_state.as_str().into()),
            ("dti", self.dti.into()),
        ]
    }
}
