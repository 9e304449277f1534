//! FICO tiering and bureau-field imputation.
//!
//! The model never sees the raw FICO range. Instead the range is mapped to
//! one of four tiers, and the tier's typical bureau-field values (taken from
//! the imputation table) stand in for the applicant's credit file.

use crate::types::FieldValue;
use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// `fico_range_low` below this raises the low-score warning.
pub const FICO_WARNING_BELOW: f64 = 660.0;

/// FICO tier derived from the midpoint of the applicant's range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FicoTier {
    Standard,
    Good,
    VeryGood,
    Exceptional,
}

impl FicoTier {
    pub const ALL: [FicoTier; 4] = [
        FicoTier::Standard,
        FicoTier::Good,
        FicoTier::VeryGood,
        FicoTier::Exceptional,
    ];

    /// Tier for a FICO range. Bands are checked low-to-high on the midpoint:
    /// `< 700` standard, `< 725` good, `< 750` very good, otherwise exceptional.
    pub fn from_range(fico_range_low: f64, fico_range_high: f64) -> Self {
        let fico_mid = (fico_range_low + fico_range_high) / 2.0;
        if fico_mid < 700.0 {
            FicoTier::Standard
        } else if fico_mid < 725.0 {
            FicoTier::Good
        } else if fico_mid < 750.0 {
            FicoTier::VeryGood
        } else {
            FicoTier::Exceptional
        }
    }

    /// Key of this tier in the imputation table
    pub fn as_str(&self) -> &'static str {
        match self {
            FicoTier::Standard => "standard",
            FicoTier::Good => "good",
            FicoTier::VeryGood => "very_good",
            FicoTier::Exceptional => "exceptional",
        }
    }
}

impl fmt::Display for FicoTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of imputing bureau fields for one applicant
#[derive(Debug, Clone, PartialEq)]
pub struct Imputation {
    /// Owned copy of the tier's default bureau fields
    pub fields: BTreeMap<String, FieldValue>,
    pub tier: FicoTier,
    /// True exactly when `fico_range_low < 660`
    pub fico_warning: bool,
}

/// Tier name -> bureau field -> default value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ImputationTable {
    tiers: BTreeMap<String, BTreeMap<String, FieldValue>>,
}

impl ImputationTable {
    /// Load the imputation table from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::from_json_str(&raw, &path.display().to_string())?;

        info!(
            path = %path.display(),
            tiers = table.tiers.len(),
            "FICO imputation table loaded"
        );

        Ok(table)
    }

    /// Parse an imputation table from JSON text. `origin` names the source
    /// in error messages.
    pub fn from_json_str(json: &str, origin: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json).map_err(|source| PipelineError::Json {
            origin: origin.to_string(),
            source,
        })?;

        for tier in FicoTier::ALL {
            if !table.tiers.contains_key(tier.as_str()) {
                warn!(tier = %tier, origin = %origin, "Imputation table has no entry for tier");
            }
        }

        Ok(table)
    }

    /// Default bureau fields for a tier. A missing tier is a logic error.
    pub fn defaults(&self, tier: FicoTier) -> Result<&BTreeMap<String, FieldValue>> {
        self.tiers
            .get(tier.as_str())
            .ok_or_else(|| PipelineError::UnknownTier(tier.as_str().to_string()))
    }

    /// Impute bureau fields from a FICO range.
    ///
    /// The warning flag looks at `fico_range_low` only, independent of the
    /// tier, so an applicant can be "exceptional" and still be warned.
    pub fn impute(&self, fico_range_low: f64, fico_range_high: f64) -> Result<Imputation> {
        let tier = FicoTier::from_range(fico_range_low, fico_range_high);
        let fields = self.defaults(tier)?.clone();

        Ok(Imputation {
            fields,
            tier,
            fico_warning: fico_range_low < FICO_WARNING_BELOW,
        })
    }
}
