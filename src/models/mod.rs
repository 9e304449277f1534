//! Trained model: bundle loading, scoring and explanation

pub mod explain;
pub mod inference;
pub mod loader;

pub use explain::{humanize, top_risk_factors};
pub use inference::Scorer;
pub use loader::{ModelBundle, StandardScaler};
