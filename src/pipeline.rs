//! Scoring pipeline entry point.
//!
//! `ReferenceStore` owns the three on-disk artifacts and loads each one at
//! most once. `ScoringContext` is the immutable, fully loaded view handed to
//! [`predict`]; build it once at startup and share it behind an `Arc`.

use crate::config::{AppConfig, DataConfig};
use crate::feature_extractor::FeatureAssembler;
use crate::imputer::ImputationTable;
use crate::macro_snapshot::MacroSnapshot;
use crate::models::{ModelBundle, Scorer};
use crate::types::{ApplicationRecord, Decision, PredictionResult, RiskTier};
use crate::Result;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Lazily loaded, cached reference artifacts.
///
/// Each accessor reads storage on first success only; later calls return
/// the same `Arc`. Concurrent first calls may both load, and all of them
/// end up with the value that was published first.
#[derive(Debug)]
pub struct ReferenceStore {
    data: DataConfig,
    imputation_table: OnceLock<Arc<ImputationTable>>,
    macro_snapshot: OnceLock<Arc<MacroSnapshot>>,
    model_bundle: OnceLock<Arc<ModelBundle>>,
}

impl ReferenceStore {
    pub fn new(data: DataConfig) -> Self {
        Self {
            data,
            imputation_table: OnceLock::new(),
            macro_snapshot: OnceLock::new(),
            model_bundle: OnceLock::new(),
        }
    }

    pub fn imputation_table(&self) -> Result<Arc<ImputationTable>> {
        cached(&self.imputation_table, || {
            ImputationTable::load(&self.data.imputation_table)
        })
    }

    pub fn macro_snapshot(&self) -> Result<Arc<MacroSnapshot>> {
        cached(&self.macro_snapshot, || {
            MacroSnapshot::load(
                &self.data.unemployment_series,
                &self.data.unemployment_column,
                &self.data.delinquency_series,
                &self.data.delinquency_column,
            )
        })
    }

    pub fn model_bundle(&self) -> Result<Arc<ModelBundle>> {
        cached(&self.model_bundle, || ModelBundle::load(&self.data.model_bundle))
    }
}

fn cached<T>(cell: &OnceLock<Arc<T>>, load: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
    if let Some(value) = cell.get() {
        return Ok(Arc::clone(value));
    }

    let loaded = Arc::new(load()?);
    Ok(Arc::clone(cell.get_or_init(|| loaded)))
}

/// Everything a prediction needs, fully loaded and read-only
#[derive(Debug, Clone)]
pub struct ScoringContext {
    imputation_table: Arc<ImputationTable>,
    macro_snapshot: Arc<MacroSnapshot>,
    assembler: FeatureAssembler,
    scorer: Scorer,
    top_risk_factors: Vec<String>,
}

impl ScoringContext {
    /// Assemble a context from already loaded artifacts
    pub fn new(
        imputation_table: Arc<ImputationTable>,
        macro_snapshot: Arc<MacroSnapshot>,
        model_bundle: Arc<ModelBundle>,
        top_factors: usize,
    ) -> Self {
        let top_risk_factors = model_bundle.top_risk_factors(top_factors);

        Self {
            imputation_table,
            macro_snapshot,
            assembler: FeatureAssembler::new(Arc::clone(&model_bundle)),
            scorer: Scorer::new(model_bundle),
            top_risk_factors,
        }
    }

    /// One-time initialization: load all three artifacts from the store.
    /// Any failure here means the service cannot score at all.
    pub fn initialize(store: &ReferenceStore, top_factors: usize) -> Result<Self> {
        let imputation_table = store.imputation_table()?;
        let macro_snapshot = store.macro_snapshot()?;
        let model_bundle = store.model_bundle()?;

        let context = Self::new(imputation_table, macro_snapshot, model_bundle, top_factors);

        info!(
            features = context.assembler.feature_count(),
            unemployment_rate = context.macro_snapshot.unemployment_rate,
            delinq_rate = context.macro_snapshot.delinq_rate,
            top_risk_factors = ?context.top_risk_factors,
            "Scoring context initialized"
        );

        Ok(context)
    }

    /// Build a store from configuration and initialize from it
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = ReferenceStore::new(config.data.clone());
        Self::initialize(&store, config.explain.top_factors)
    }

    pub fn macro_snapshot(&self) -> &MacroSnapshot {
        &self.macro_snapshot
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    /// Structural risk drivers reported with every prediction
    pub fn top_risk_factors(&self) -> &[String] {
        &self.top_risk_factors
    }

    /// Score one application. See [`predict`].
    pub fn predict(&self, application: &ApplicationRecord) -> Result<PredictionResult> {
        predict(self, application)
    }
}

/// Score a validated application.
///
/// Tier and impute from the FICO range, merge with the macro snapshot,
/// align to the trained schema, score, then band and explain. The only
/// possible errors are logic errors (a tier missing from the table, or a
/// vector that does not fit the bundle).
pub fn predict(
    context: &ScoringContext,
    application: &ApplicationRecord,
) -> Result<PredictionResult> {
    let imputation = context
        .imputation_table
        .impute(application.fico_range_low, application.fico_range_high)?;

    let features = context.assembler.assemble(
        application,
        &context.macro_snapshot,
        &imputation.fields,
    );
    let pd_score = context.scorer.predict_proba(&features)?;

    let decision = Decision::from_score(pd_score);
    let risk_tier = RiskTier::from_score(pd_score);

    debug!(
        fico_tier = %imputation.tier,
        fico_warning = imputation.fico_warning,
        pd_score = pd_score,
        decision = %decision,
        "Application scored"
    );

    Ok(PredictionResult {
        pd_score,
        risk_tier,
        decision,
        fico_warning: imputation.fico_warning,
        top_risk_factors: context.top_risk_factors.clone(),
        unemployment_rate: context.macro_snapshot.unemployment_rate,
        delinq_rate: context.macro_snapshot.delinq_rate,
        imputed_fields: imputation.fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StandardScaler;
    use crate::types::FieldValue;
    use crate::PipelineError;
    use std::io::Write;

    fn table() -> ImputationTable {
        ImputationTable::from_json_str(
            r#"{
                "standard":    {"revol_util": 70.0, "inq_last_6mths": 3},
                "good":        {"revol_util": 50.0, "inq_last_6mths": 1},
                "very_good":   {"revol_util": 35.0, "inq_last_6mths": 1},
                "exceptional": {"revol_util": 20.0, "inq_last_6mths": 0}
            }"#,
            "test",
        )
        .unwrap()
    }

    fn bundle() -> ModelBundle {
        ModelBundle::new(
            vec![
                "loan_amnt".to_string(),
                "annual_inc".to_string(),
                "dti".to_string(),
                "revol_util".to_string(),
                "inq_last_6mths".to_string(),
                "home_ownership_RENT".to_string(),
            ],
            vec![0.3, -0.6, 0.4, 0.8, 0.5, 0.4],
            -0.7,
            StandardScaler {
                mean: vec![15000.0, 75000.0, 18.0, 45.0, 1.0, 0.4],
                scale: vec![9000.0, 40000.0, 8.0, 20.0, 1.0, 0.5],
            },
        )
        .unwrap()
    }

    fn context() -> ScoringContext {
        ScoringContext::new(
            Arc::new(table()),
            Arc::new(MacroSnapshot {
                unemployment_rate: 4.2,
                delinq_rate: 3.1,
            }),
            Arc::new(bundle()),
            3,
        )
    }

    fn application(fico_low: f64, fico_high: f64) -> ApplicationRecord {
        ApplicationRecord {
            loan_amnt: 20000.0,
            term: "36 months".to_string(),
            purpose: "credit_card".to_string(),
            annual_inc: 60000.0,
            emp_length: 6.0,
            home_ownership: "RENT".to_string(),
            verification_status: "Source Verified".to_string(),
            application_type: "Individual".to_string(),
            addr_state: "NY".to_string(),
            dti: 21.0,
            fico_range_low: fico_low,
            fico_range_high: fico_high,
        }
    }

    #[test]
    fn test_predict_result_fields() {
        let result = predict(&context(), &application(650.0, 654.0)).unwrap();

        assert!(result.pd_score > 0.0 && result.pd_score < 1.0);
        assert_eq!(result.decision, Decision::from_score(result.pd_score));
        assert_eq!(result.risk_tier, RiskTier::from_score(result.pd_score));
        assert!(result.fico_warning);
        assert_eq!(result.unemployment_rate, 4.2);
        assert_eq!(result.delinq_rate, 3.1);
        assert_eq!(result.imputed_fields["revol_util"], FieldValue::Number(70.0));
        assert_eq!(
            result.top_risk_factors,
            vec!["Revol Util", "Inq Last 6Mths", "Dti"]
        );
    }

    #[test]
    fn test_better_fico_lowers_pd() {
        let ctx = context();

        let standard = predict(&ctx, &application(640.0, 644.0)).unwrap();
        let exceptional = predict(&ctx, &application(790.0, 794.0)).unwrap();

        assert!(exceptional.pd_score < standard.pd_score);
        assert!(!exceptional.fico_warning);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let ctx = context();
        let app = application(705.0, 709.0);

        let first = serde_json::to_vec(&ctx.predict(&app).unwrap()).unwrap();
        let second = serde_json::to_vec(&ctx.predict(&app).unwrap()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_tier_propagates() {
        let partial =
            ImputationTable::from_json_str(r#"{"standard": {"revol_util": 70.0}}"#, "test")
                .unwrap();
        let ctx = ScoringContext::new(
            Arc::new(partial),
            Arc::new(MacroSnapshot {
                unemployment_rate: 4.2,
                delinq_rate: 3.1,
            }),
            Arc::new(bundle()),
            3,
        );

        let err = predict(&ctx, &application(760.0, 764.0)).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTier(_)));
    }

    #[test]
    fn test_store_caches_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("table.json")).unwrap();
        write!(file, r#"{{"standard": {{"revol_util": 70.0}}}}"#).unwrap();
        drop(file);

        let store = ReferenceStore::new(DataConfig {
            imputation_table: dir.path().join("table.json"),
            ..DataConfig::default()
        });

        let first = store.imputation_table().unwrap();
        std::fs::remove_file(dir.path().join("table.json")).unwrap();
        let second = store.imputation_table().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_store_concurrent_first_load() {
        let store = ReferenceStore::new(
            DataConfig::default().relative_to(env!("CARGO_MANIFEST_DIR")),
        );
        let barrier = std::sync::Barrier::new(8);

        let bundles: Vec<Arc<ModelBundle>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        store.model_bundle().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let published = store.model_bundle().unwrap();
        for bundle in &bundles {
            assert!(Arc::ptr_eq(bundle, &published));
        }
    }

    #[test]
    fn test_store_failure_is_service_level() {
        let store = ReferenceStore::new(DataConfig {
            model_bundle: "/nonexistent/model_bundle.json".into(),
            ..DataConfig::default()
        });

        let err = store.model_bundle().unwrap_err();
        assert!(err.is_service_unavailable());
    }
}
