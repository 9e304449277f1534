//! Feature assembly and schema alignment.
//!
//! Turns an application, the macro snapshot and the imputed bureau fields
//! into one row laid out exactly like the model's training matrix.
//!
//! Alignment never fails. Columns the schema expects but the row lacks are
//! zero-filled, and columns the schema does not know are dropped. A
//! categorical level unseen at training time therefore scores as an
//! all-zero indicator block, silently. The zero-filled and dropped counts
//! are traced at debug level and nothing else reports them.

use crate::macro_snapshot::MacroSnapshot;
use crate::models::loader::ModelBundle;
use crate::types::{ApplicationRecord, FieldValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// One merged, not yet expanded, feature record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl FeatureRecord {
    /// Merge the three feature sources.
    ///
    /// Precedence on a name collision: imputed bureau fields, then macro
    /// values, then applicant fields.
    pub fn merge<'a, A, M>(
        applicant: A,
        macro_fields: M,
        imputed: &BTreeMap<String, FieldValue>,
    ) -> Self
    where
        A: IntoIterator<Item = (&'a str, FieldValue)>,
        M: IntoIterator<Item = (&'a str, FieldValue)>,
    {
        let mut fields = imputed.clone();

        for (name, value) in macro_fields.into_iter().chain(applicant) {
            if fields.contains_key(name) {
                debug!(field = %name, "Field shadowed by higher-precedence source");
                continue;
            }
            fields.insert(name.to_string(), value);
        }

        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Expand categorical (text) fields into `{field}_{level}` indicators.
///
/// Levels are collected per field across all rows and sorted lexically; the
/// first level is the reference and gets no column. Numeric fields pass
/// through unchanged. With a single row every field has exactly one level,
/// so no indicator column is produced.
pub fn expand_categoricals(rows: &[FeatureRecord]) -> Vec<BTreeMap<String, f64>> {
    let mut levels: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for row in rows {
        for (name, value) in &row.fields {
            if let FieldValue::Text(level) = value {
                levels.entry(name.as_str()).or_default().insert(level.as_str());
            }
        }
    }

    rows.iter()
        .map(|row| {
            let mut expanded = BTreeMap::new();
            for (name, value) in &row.fields {
                if let FieldValue::Number(n) = value {
                    expanded.insert(name.clone(), *n);
                }
            }

            for (field, field_levels) in &levels {
                let current = row.get(field).and_then(FieldValue::as_text);
                for level in field_levels.iter().skip(1) {
                    let indicator = if current == Some(*level) { 1.0 } else { 0.0 };
                    expanded.insert(format!("{}_{}", field, level), indicator);
                }
            }

            expanded
        })
        .collect()
}

/// A single row aligned to the model schema
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<'a> {
    names: &'a [String],
    values: Vec<f64>,
}

impl<'a> FeatureVector<'a> {
    /// Schema column names, in order
    pub fn names(&self) -> &'a [String] {
        self.names
    }

    /// Values in schema order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Builds model-ready rows against a bundle's trained schema
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    bundle: Arc<ModelBundle>,
}

impl FeatureAssembler {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    /// Trained schema this assembler aligns to
    pub fn schema(&self) -> &[String] {
        self.bundle.feature_names()
    }

    /// Number of features produced.
    pub fn feature_count(&self) -> usize {
        self.bundle.len()
    }

    /// Full assembly for one application: merge, expand, align.
    ///
    /// The FICO range never enters the record; FICO reaches the model only
    /// through `imputed`.
    pub fn assemble(
        &self,
        application: &ApplicationRecord,
        snapshot: &MacroSnapshot,
        imputed: &BTreeMap<String, FieldValue>,
    ) -> FeatureVector<'_> {
        let record = FeatureRecord::merge(
            application.feature_fields(),
            snapshot.feature_fields(),
            imputed,
        );

        let expanded = expand_categoricals(std::slice::from_ref(&record));
        match expanded.first() {
            Some(row) => self.align(row),
            None => self.align(&BTreeMap::new()),
        }
    }

    /// Reindex an expanded row onto the schema: absent columns become 0,
    /// unknown columns are dropped.
    pub fn align(&self, expanded: &BTreeMap<String, f64>) -> FeatureVector<'_> {
        let schema = self.schema();
        let mut zero_filled = 0usize;

        let values: Vec<f64> = schema
            .iter()
            .map(|name| match expanded.get(name) {
                Some(v) => *v,
                None => {
                    zero_filled += 1;
                    0.0
                }
            })
            .collect();

        let dropped = expanded.len() - (schema.len() - zero_filled);

        debug!(
            schema_columns = schema.len(),
            zero_filled = zero_filled,
            dropped = dropped,
            "Feature row aligned to trained schema"
        );

        FeatureVector {
            names: schema,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loader::StandardScaler;

    fn bundle(schema: &[&str]) -> Arc<ModelBundle> {
        let n = schema.len();
        Arc::new(
            ModelBundle::new(
                schema.iter().map(|s| s.to_string()).collect(),
                vec![0.1; n],
                0.0,
                StandardScaler {
                    mean: vec![0.0; n],
                    scale: vec![1.0; n],
                },
            )
            .unwrap(),
        )
    }

    fn application(purpose: &str) -> ApplicationRecord {
        ApplicationRecord {
            loan_amnt: 10000.0,
            term: "60 months".to_string(),
            purpose: purpose.to_string(),
            annual_inc: 52000.0,
            emp_length: 2.0,
            home_ownership: "OWN".to_string(),
            verification_status: "Not Verified".to_string(),
            application_type: "Individual".to_string(),
            addr_state: "TX".to_string(),
            dti: 22.0,
            fico_range_low: 640.0,
            fico_range_high: 644.0,
        }
    }

    fn snapshot() -> MacroSnapshot {
        MacroSnapshot {
            unemployment_rate: 4.1,
            delinq_rate: 3.0,
        }
    }

    fn imputed() -> BTreeMap<String, FieldValue> {
        let mut m = BTreeMap::new();
        m.insert("revol_util".to_string(), FieldValue::Number(61.0));
        m.insert("grade".to_string(), FieldValue::Text("D".to_string()));
        m
    }

    const SCHEMA: [&str; 9] = [
        "loan_amnt",
        "annual_inc",
        "dti",
        "revol_util",
        "unemployment_rate",
        "term_60 months",
        "home_ownership_OWN",
        "purpose_small_business",
        "grade_D",
    ];

    #[test]
    fn test_imputed_fields_win_collisions() {
        let mut imputed = imputed();
        imputed.insert("dti".to_string(), FieldValue::Number(35.0));
        imputed.insert("delinq_rate".to_string(), FieldValue::Number(9.9));

        let record = FeatureRecord::merge(
            application("car").feature_fields(),
            snapshot().feature_fields(),
            &imputed,
        );

        assert_eq!(record.get("dti"), Some(&FieldValue::Number(35.0)));
        assert_eq!(record.get("delinq_rate"), Some(&FieldValue::Number(9.9)));
        assert_eq!(record.get("unemployment_rate"), Some(&FieldValue::Number(4.1)));
    }

    #[test]
    fn test_macro_wins_over_applicant() {
        let record = FeatureRecord::merge(
            vec![("unemployment_rate", FieldValue::Number(99.0))],
            snapshot().feature_fields(),
            &BTreeMap::new(),
        );

        assert_eq!(record.get("unemployment_rate"), Some(&FieldValue::Number(4.1)));
    }

    #[test]
    fn test_merge_excludes_fico() {
        let record = FeatureRecord::merge(
            application("car").feature_fields(),
            snapshot().feature_fields(),
            &imputed(),
        );

        assert!(record.get("fico_range_low").is_none());
        assert!(record.get("fico_range_high").is_none());
        assert_eq!(record.len(), 10 + 2 + 2);
    }

    #[test]
    fn test_expand_drops_reference_level() {
        let row = |term: &str, own: &str| {
            FeatureRecord::merge(
                vec![
                    ("term", FieldValue::from(term)),
                    ("home_ownership", FieldValue::from(own)),
                    ("dti", FieldValue::Number(10.0)),
                ],
                Vec::new(),
                &BTreeMap::new(),
            )
        };
        let rows = vec![
            row("60 months", "RENT"),
            row("36 months", "OWN"),
            row("36 months", "MORTGAGE"),
        ];

        let expanded = expand_categoricals(&rows);

        // "36 months" and "MORTGAGE" sort first and are the reference levels
        assert_eq!(expanded[0]["term_60 months"], 1.0);
        assert!(!expanded[0].contains_key("term_36 months"));
        assert!(!expanded[0].contains_key("home_ownership_MORTGAGE"));
        assert_eq!(expanded[0]["home_ownership_RENT"], 1.0);
        assert_eq!(expanded[0]["home_ownership_OWN"], 0.0);
        assert_eq!(expanded[1]["home_ownership_OWN"], 1.0);
        assert_eq!(expanded[2]["term_60 months"], 0.0);
        assert_eq!(expanded[2]["dti"], 10.0);
        assert_eq!(expanded[2].len(), 4);
    }

    #[test]
    fn test_single_row_has_no_indicators() {
        let record = FeatureRecord::merge(
            application("car").feature_fields(),
            snapshot().feature_fields(),
            &imputed(),
        );

        let expanded = expand_categoricals(std::slice::from_ref(&record));

        assert!(expanded[0].keys().all(|k| !k.contains("_OWN") && !k.starts_with("term")));
        assert_eq!(expanded[0]["loan_amnt"], 10000.0);
    }

    #[test]
    fn test_align_matches_schema_exactly() {
        let assembler = FeatureAssembler::new(bundle(&SCHEMA));

        let features = assembler.assemble(&application("car"), &snapshot(), &imputed());

        assert_eq!(features.len(), SCHEMA.len());
        let names: Vec<&str> = features.iter().map(|(n, _)| n).collect();
        assert_eq!(names, SCHEMA.to_vec());
        assert_eq!(features.get("loan_amnt"), Some(10000.0));
        assert_eq!(features.get("revol_util"), Some(61.0));
        assert_eq!(features.get("unemployment_rate"), Some(4.1));
        assert_eq!(features.get("home_ownership_OWN"), Some(0.0));
        assert_eq!(features.get("emp_length"), None);
    }

    #[test]
    fn test_unknown_level_absorbed() {
        let assembler = FeatureAssembler::new(bundle(&SCHEMA));

        let known = assembler.assemble(&application("car"), &snapshot(), &imputed());
        let unseen = assembler.assemble(&application("space_tourism"), &snapshot(), &imputed());

        assert_eq!(known.names(), unseen.names());
        assert_eq!(unseen.len(), SCHEMA.len());
        assert_eq!(unseen.get("purpose_small_business"), Some(0.0));
    }

    #[test]
    fn test_align_fills_and_drops() {
        let assembler = FeatureAssembler::new(bundle(&["a", "b", "c"]));
        let mut row = BTreeMap::new();
        row.insert("c".to_string(), 3.0);
        row.insert("a".to_string(), 1.0);
        row.insert("z".to_string(), 26.0);

        let features = assembler.align(&row);

        assert_eq!(features.values(), &[1.0, 0.0, 3.0]);
    }
}
