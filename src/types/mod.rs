//! Type definitions for the loan risk pipeline

pub mod application;
pub mod prediction;

pub use application::{ApplicationRecord, FieldValue};
pub use prediction::{Decision, PredictionResult, RiskTier};
