//! Feature preprocessing for the anomaly model.
//!
//! `Preprocessor::fit` learns per-column standardization and category
//! vocabularies from a labeled corpus and freezes them into a
//! `PreprocessorState`. Inference only ever calls
//! `PreprocessorState::transform`, which reads the frozen state and never
//! re-fits. Output columns are the numerical features in configured order
//! followed by the one-hot blocks of each categorical feature.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::types::{DonationRecord, LabeledDonation, ProcessedData};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info};

/// Record columns that can be standardized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericColumn {
    Amount,
    DonationFrequencyFromIp,
    GeoDistanceFromCampaign,
    CampaignAge,
    SentimentScore,
}

impl NumericColumn {
    pub fn name(&self) -> &'static str {
        match self {
            NumericColumn::Amount => "amount",
            NumericColumn::DonationFrequencyFromIp => "donation_frequency_from_ip",
            NumericColumn::GeoDistanceFromCampaign => "geo_distance_from_campaign",
            NumericColumn::CampaignAge => "campaign_age",
            NumericColumn::SentimentScore => "sentiment_score",
        }
    }

    fn value(&self, data: &ProcessedData) -> f64 {
        let record = &data.record;
        match self {
            NumericColumn::Amount => record.amount,
            NumericColumn::DonationFrequencyFromIp => record.donation_frequency_from_ip as f64,
            NumericColumn::GeoDistanceFromCampaign => record.geo_distance_from_campaign,
            NumericColumn::CampaignAge => record.campaign_age as f64,
            NumericColumn::SentimentScore => data.sentiment_score.unwrap_or(0.0),
        }
    }
}

impl FromStr for NumericColumn {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name {
            "amount" => Ok(NumericColumn::Amount),
            "donation_frequency_from_ip" => Ok(NumericColumn::DonationFrequencyFromIp),
            "geo_distance_from_campaign" => Ok(NumericColumn::GeoDistanceFromCampaign),
            "campaign_age" => Ok(NumericColumn::CampaignAge),
            "sentiment_score" => Ok(NumericColumn::SentimentScore),
            other => Err(format!("unknown numerical column '{}'", other)),
        }
    }
}

/// Record columns that can be one-hot encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalColumn {
    DeviceType,
    IsDonorAnonymous,
}

impl CategoricalColumn {
    pub fn name(&self) -> &'static str {
        match self {
            CategoricalColumn::DeviceType => "device_type",
            CategoricalColumn::IsDonorAnonymous => "is_donor_anonymous",
        }
    }

    fn category(&self, data: &ProcessedData) -> String {
        match self {
            CategoricalColumn::DeviceType => data.record.device_type.clone(),
            CategoricalColumn::IsDonorAnonymous => data.record.is_donor_anonymous.to_string(),
        }
    }
}

impl FromStr for CategoricalColumn {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name {
            "device_type" => Ok(CategoricalColumn::DeviceType),
            "is_donor_anonymous" => Ok(CategoricalColumn::IsDonorAnonymous),
            other => Err(format!("unknown categorical column '{}'", other)),
        }
    }
}

/// Fitted standardization of one numerical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledColumn {
    pub name: String,
    pub mean: f64,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: f64,
}

/// Fitted vocabulary of one categorical column, sorted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// Frozen preprocessing parameters produced by a fit pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorState {
    numerical: Vec<ScaledColumn>,
    categorical: Vec<EncodedColumn>,
    feature_names: Vec<String>,
}

/// Output of a transform pass
#[derive(Debug, Clone)]
pub struct Transformed {
    /// One row per record, `n_features` columns
    pub features: Array2<f64>,
    /// Pre-encoding values annotated with sentiment, same order as rows
    pub processed: Vec<ProcessedData>,
}

/// Fits preprocessing state from labeled training donations.
pub struct Preprocessor {
    numerical: Vec<String>,
    categorical: Vec<String>,
    min_samples: usize,
}

impl Preprocessor {
    pub fn new(numerical: Vec<String>, categorical: Vec<String>, min_samples: usize) -> Self {
        Self {
            numerical,
            categorical,
            min_samples,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.features.numerical.clone(),
            config.features.categorical.clone(),
            config.model.min_samples,
        )
    }

    /// Annotate a record with its comment sentiment
    pub fn process(record: &DonationRecord) -> ProcessedData {
        let extractor = FeatureExtractor::new();
        ProcessedData {
            record: record.clone(),
            sentiment_score: Some(extractor.sentiment_score(&record.donor_comment)),
        }
    }

    /// Learn scaling and vocabularies from a training corpus.
    ///
    /// Labels are not read.
    pub fn fit(&self, training: &[LabeledDonation]) -> Result<PreprocessorState> {
        if training.is_empty() {
            return Err(Error::Fit("training corpus is empty".to_string()));
        }
        if training.len() < self.min_samples {
            return Err(Error::Fit(format!(
                "need at least {} samples, got {}",
                self.min_samples,
                training.len()
            )));
        }

        let numeric_columns = self
            .numerical
            .iter()
            .map(|name| name.parse::<NumericColumn>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Fit(format!("required column is absent: {}", e)))?;
        let categorical_columns = self
            .categorical
            .iter()
            .map(|name| name.parse::<CategoricalColumn>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Fit(format!("required column is absent: {}", e)))?;

        let processed: Vec<ProcessedData> = training
            .iter()
            .map(|labeled| Self::process(&labeled.record))
            .collect();
        let n = processed.len() as f64;

        let mut numerical = Vec::with_capacity(numeric_columns.len());
        for column in &numeric_columns {
            let values: Vec<f64> = processed.iter().map(|p| column.value(p)).collect();
            if values.iter().any(|v| !v.is_finite()) {
                return Err(Error::Fit(format!(
                    "column '{}' contains non-finite values",
                    column.name()
                )));
            }

            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std_dev = variance.sqrt();
            let scale = if std_dev > f64::EPSILON { std_dev } else { 1.0 };

            debug!(column = column.name(), mean, scale, "Fitted numerical column");
            numerical.push(ScaledColumn {
                name: column.name().to_string(),
                mean,
                scale,
            });
        }

        let mut categorical = Vec::with_capacity(categorical_columns.len());
        for column in &categorical_columns {
            let vocabulary: BTreeSet<String> =
                processed.iter().map(|p| column.category(p)).collect();

            debug!(
                column = column.name(),
                categories = vocabulary.len(),
                "Fitted categorical column"
            );
            categorical.push(EncodedColumn {
                name: column.name().to_string(),
                categories: vocabulary.into_iter().collect(),
            });
        }

        let feature_names = feature_names(&numerical, &categorical);
        info!(
            samples = training.len(),
            features = feature_names.len(),
            "Preprocessor fitted"
        );

        Ok(PreprocessorState {
            numerical,
            categorical,
            feature_names,
        })
    }
}

fn feature_names(numerical: &[ScaledColumn], categorical: &[EncodedColumn]) -> Vec<String> {
    let mut names: Vec<String> = numerical.iter().map(|c| c.name.clone()).collect();
    for column in categorical {
        names.extend(
            column
                .categories
                .iter()
                .map(|category| format!("{}_{}", column.name, category)),
        );
    }
    names
}

impl PreprocessorState {
    /// Ordered output feature names
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn numerical(&self) -> &[ScaledColumn] {
        &self.numerical
    }

    pub fn categorical(&self) -> &[EncodedColumn] {
        &self.categorical
    }

    /// Encode records with the frozen parameters.
    ///
    /// Unseen categories produce an all-zero block for their column.
    pub fn transform(&self, records: &[DonationRecord]) -> Result<Transformed> {
        let numeric_columns = self
            .numerical
            .iter()
            .map(|c| c.name.parse::<NumericColumn>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Inference)?;
        let categorical_columns = self
            .categorical
            .iter()
            .map(|c| c.name.parse::<CategoricalColumn>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Inference)?;

        let processed: Vec<ProcessedData> = records.iter().map(Preprocessor::process).collect();
        let mut features = Array2::zeros((processed.len(), self.n_features()));

        for (row, data) in processed.iter().enumerate() {
            for (col, (column, scaled)) in numeric_columns.iter().zip(&self.numerical).enumerate() {
                let value = column.value(data);
                if !value.is_finite() {
                    return Err(Error::Inference(format!(
                        "column '{}' has non-finite value {}",
                        scaled.name, value
                    )));
                }
                features[[row, col]] = (value - scaled.mean) / scaled.scale;
            }

            let mut offset = self.numerical.len();
            for (column, encoded) in categorical_columns.iter().zip(&self.categorical) {
                let category = column.category(data);
                if let Ok(position) = encoded.categories.binary_search(&category) {
                    features[[row, offset + position]] = 1.0;
                }
                offset += encoded.categories.len();
            }
        }

        Ok(Transformed {
            features,
            processed,
        })
    }

    /// Verify a reloaded state is internally consistent
    pub fn check_schema(&self) -> Result<()> {
        for column in &self.numerical {
            column
                .name
                .parse::<NumericColumn>()
                .map_err(|e| Error::Load(format!("preprocessor schema mismatch: {}", e)))?;
            if !(column.scale.is_finite() && column.scale > 0.0 && column.mean.is_finite()) {
                return Err(Error::Load(format!(
                    "preprocessor has invalid scaling for '{}'",
                    column.name
                )));
            }
        }
        for column in &self.categorical {
            column
                .name
                .parse::<CategoricalColumn>()
                .map_err(|e| Error::Load(format!("preprocessor schema mismatch: {}", e)))?;
            if column.categories.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(Error::Load(format!(
                    "vocabulary of '{}' is not sorted and unique",
                    column.name
                )));
            }
        }
        if feature_names(&self.numerical, &self.categorical) != self.feature_names {
            return Err(Error::Load(
                "stored feature names disagree with fitted columns".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FraudLabel;

    fn labeled(amount: f64, device: &str, anonymous: bool, comment: &str) -> LabeledDonation {
        LabeledDonation::new(
            DonationRecord::new(amount, device)
                .with_comment(comment)
                .with_anonymous(anonymous)
                .with_frequency((amount as u32) % 4)
                .with_distance(amount * 3.0)
                .with_campaign_age(30),
            FraudLabel::Legit,
        )
    }

    fn corpus() -> Vec<LabeledDonation> {
        vec![
            labeled(10.0, "desktop", false, "Great cause! Happy to help."),
            labeled(20.0, "mobile", false, ""),
            labeled(30.0, "tablet", true, "Keep up the good work!"),
            labeled(40.0, "desktop", false, "Hope this makes a difference."),
            labeled(50.0, "mobile", true, ""),
        ]
    }

    fn preprocessor() -> Preprocessor {
        let config = AppConfig::default();
        Preprocessor::new(
            config.features.numerical.clone(),
            config.features.categorical.clone(),
            3,
        )
    }

    #[test]
    fn test_feature_ordering() {
        let state = preprocessor().fit(&corpus()).unwrap();
        assert_eq!(
            state.feature_names(),
            &[
                "amount",
                "donation_frequency_from_ip",
                "geo_distance_from_campaign",
                "campaign_age",
                "sentiment_score",
                "device_type_desktop",
                "device_type_mobile",
                "device_type_tablet",
                "is_donor_anonymous_false",
                "is_donor_anonymous_true",
            ]
        );
    }

    #[test]
    fn test_standardization() {
        let state = preprocessor().fit(&corpus()).unwrap();
        let records: Vec<DonationRecord> = corpus().into_iter().map(|l| l.record).collect();
        let transformed = state.transform(&records).unwrap();

        let amount = transformed.features.column(0);
        let mean: f64 = amount.iter().sum::<f64>() / amount.len() as f64;
        let variance: f64 = amount.iter().map(|v| v * v).sum::<f64>() / amount.len() as f64;
        assert!(mean.abs() < 1e-12);
        assert!((variance - 1.0).abs() < 1e-12);

        // Constant campaign_age centers to zero without dividing by zero
        assert!(transformed.features.column(3).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let state = preprocessor().fit(&corpus()).unwrap();
        let records: Vec<DonationRecord> = corpus().into_iter().map(|l| l.record).collect();
        let first = state.transform(&records).unwrap();
        let second = state.transform(&records).unwrap();

        let bits = |a: &Array2<f64>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first.features), bits(&second.features));
    }

    #[test]
    fn test_unknown_category_encodes_as_zeros() {
        let state = preprocessor().fit(&corpus()).unwrap();
        let record = DonationRecord::new(25.0, "smart_fridge");
        let transformed = state.transform(&[record]).unwrap();

        let row = transformed.features.row(0);
        assert_eq!(&row.as_slice().unwrap()[5..8], &[0.0, 0.0, 0.0]);
        // The anonymity block is still encoded
        assert_eq!(&row.as_slice().unwrap()[8..10], &[1.0, 0.0]);
    }

    #[test]
    fn test_empty_comment_has_zero_sentiment() {
        let processed = Preprocessor::process(&DonationRecord::new(5.0, "mobile"));
        assert_eq!(processed.sentiment_score, Some(0.0));
    }

    #[test]
    fn test_fit_requires_min_samples() {
        let err = preprocessor().fit(&corpus()[..2]).unwrap_err();
        assert!(matches!(err, Error::Fit(_)));
    }

    #[test]
    fn test_fit_rejects_empty_corpus() {
        let config = AppConfig::default();
        let preprocessor = Preprocessor::new(
            config.features.numerical.clone(),
            config.features.categorical.clone(),
            0,
        );
        assert!(matches!(preprocessor.fit(&[]), Err(Error::Fit(_))));
    }

    #[test]
    fn test_fit_rejects_absent_column() {
        let preprocessor = Preprocessor::new(
            vec!["amount".to_string(), "card_number".to_string()],
            vec![],
            1,
        );
        assert!(matches!(preprocessor.fit(&corpus()), Err(Error::Fit(_))));
    }

    #[test]
    fn test_transform_rejects_non_finite_values() {
        let state = preprocessor().fit(&corpus()).unwrap();
        let record = DonationRecord::new(f64::NAN, "desktop");
        assert!(matches!(state.transform(&[record]), Err(Error::Inference(_))));
    }

    #[test]
    fn test_state_round_trip() {
        let state = preprocessor().fit(&corpus()).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let restored: PreprocessorState = serde_json::from_str(&json).unwrap();

        assert_eq!(state, restored);
        assert!(restored.check_schema().is_ok());
    }

    #[test]
    fn test_check_schema_detects_tampering() {
        let mut state = preprocessor().fit(&corpus()).unwrap();
        state.feature_names.pop();
        assert!(matches!(state.check_schema(), Err(Error::Load(_))));
    }
}
