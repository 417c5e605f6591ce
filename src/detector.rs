//! Scoring entry point shared by the serving loop

use crate::error::{Error, Result};
use crate::models::{ArtifactStore, FittedPipeline};
use crate::types::{DonationRecord, PredictionOutcome};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Fraud detector over a lazily loaded, immutable pipeline.
///
/// The pipeline is loaded at most once. A failed load leaves the detector
/// uninitialized and the next `load` or `predict` tries again.
pub struct Detector {
    store: Option<ArtifactStore>,
    pipeline: OnceCell<FittedPipeline>,
}

impl Detector {
    /// Detector that loads its artifacts from `store` on first use
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store: Some(store),
            pipeline: OnceCell::new(),
        }
    }

    /// Detector over states already held in memory
    pub fn from_fitted(pipeline: FittedPipeline) -> Result<Self> {
        pipeline.check_schema()?;
        Ok(Self {
            store: None,
            pipeline: OnceCell::with_value(pipeline),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.pipeline.get().is_some()
    }

    /// Load both artifacts, or return the already loaded pipeline
    pub fn load(&self) -> Result<&FittedPipeline> {
        self.pipeline.get_or_try_init(|| {
            let store = self
                .store
                .as_ref()
                .ok_or_else(|| Error::Load("no artifact store configured".to_string()))?;

            info!(
                preprocessor = %store.preprocessor_path().display(),
                model = %store.model_path().display(),
                "Loading fraud model"
            );
            store.load().map_err(|e| {
                warn!(error = %e, "Fraud model load failed");
                e
            })
        })
    }

    /// Score one donation.
    ///
    /// The outcome carries no explanation; attach one with
    /// [`PredictionOutcome::with_explanation`].
    pub fn predict(&self, record: &DonationRecord) -> Result<PredictionOutcome> {
        let pipeline = self.load()?;
        let donation_id = record.donation_id.as_deref().unwrap_or("-");

        let scored = pipeline
            .preprocessor
            .transform(std::slice::from_ref(record))
            .and_then(|transformed| {
                let (label, fraud_score) = pipeline.model.score_one(&transformed.features.row(0))?;
                let processed = transformed
                    .processed
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::Inference("transform returned no rows".to_string()))?;
                Ok((label, fraud_score, processed))
            });

        match scored {
            Ok((label, fraud_score, processed)) => {
                debug!(
                    donation_id = %donation_id,
                    fraud_score,
                    is_fraud = label.is_outlier(),
                    "Donation scored"
                );
                Ok(PredictionOutcome::new(label.is_outlier(), fraud_score, processed))
            }
            Err(e) => {
                error!(donation_id = %donation_id, error = %e, "Scoring failed");
                Err(e)
            }
        }
    }

    /// Score each donation independently, stopping at the first failure
    pub fn predict_batch(&self, records: &[DonationRecord]) -> Result<Vec<PredictionOutcome>> {
        records.iter().map(|record| self.predict(record)).collect()
    }
}
