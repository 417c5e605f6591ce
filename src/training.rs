//! Offline training job: dataset loading, split, fit and evaluation

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::evaluation::EvaluationReport;
use crate::models::{AnomalyModel, ArtifactStore, FittedPipeline};
use crate::preprocess::Preprocessor;
use crate::types::{DonationRecord, FraudLabel, LabeledDonation};
use crate::validation::coerce_bool;
use rand::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One CSV row of a labeled donation dataset
#[derive(Debug, Serialize, Deserialize)]
struct DonationRow {
    #[serde(default)]
    donation_id: Option<String>,
    amount: f64,
    donation_time: String,
    #[serde(default)]
    donor_comment: String,
    donation_frequency_from_ip: u32,
    device_type: String,
    geo_distance_from_campaign: f64,
    #[serde(deserialize_with = "lenient_bool")]
    is_donor_anonymous: bool,
    campaign_age: u32,
    label: u8,
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    coerce_bool(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean '{}'", raw)))
}

impl From<&LabeledDonation> for DonationRow {
    fn from(donation: &LabeledDonation) -> Self {
        let record = &donation.record;
        Self {
            donation_id: record.donation_id.clone(),
            amount: record.amount,
            donation_time: record.donation_time.clone(),
            donor_comment: record.donor_comment.clone(),
            donation_frequency_from_ip: record.donation_frequency_from_ip,
            device_type: record.device_type.clone(),
            geo_distance_from_campaign: record.geo_distance_from_campaign,
            is_donor_anonymous: record.is_donor_anonymous,
            campaign_age: record.campaign_age,
            label: donation.label.as_flag(),
        }
    }
}

impl DonationRow {
    fn into_labeled(self, line: usize) -> Result<LabeledDonation> {
        let label = FraudLabel::from_flag(self.label).ok_or_else(|| {
            Error::Fit(format!("row {}: label must be 0 or 1, got {}", line, self.label))
        })?;
        let record = DonationRecord {
            donation_id: self.donation_id.filter(|id| !id.is_empty()),
            amount: self.amount,
            donation_time: self.donation_time,
            donor_comment: self.donor_comment,
            donation_frequency_from_ip: self.donation_frequency_from_ip,
            device_type: self.device_type,
            geo_distance_from_campaign: self.geo_distance_from_campaign,
            is_donor_anonymous: self.is_donor_anonymous,
            campaign_age: self.campaign_age,
        };
        Ok(LabeledDonation::new(record, label))
    }
}

/// Read a labeled donation CSV with a header row
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledDonation>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::Fit(format!("cannot open dataset {}: {}", path.display(), e)))?;

    let mut dataset = Vec::new();
    for (index, row) in reader.deserialize::<DonationRow>().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row = row.map_err(|e| Error::Fit(format!("row {}: {}", line, e)))?;
        dataset.push(row.into_labeled(line)?);
    }

    info!(path = %path.display(), rows = dataset.len(), "Dataset loaded");
    Ok(dataset)
}

/// Write labeled donations as CSV with a header row
pub fn write_dataset<P: AsRef<Path>>(path: P, dataset: &[LabeledDonation]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::Persist(format!("cannot create {}: {}", path.display(), e)))?;
    for donation in dataset {
        writer
            .serialize(DonationRow::from(donation))
            .map_err(|e| Error::Persist(format!("cannot write {}: {}", path.display(), e)))?;
    }
    writer
        .flush()
        .map_err(|e| Error::Persist(format!("cannot write {}: {}", path.display(), e)))
}

/// Split into (train, test), holding out `test_size` of each class.
///
/// Rows keep their original relative order within each split.
pub fn stratified_split(
    dataset: &[LabeledDonation],
    test_size: f64,
    seed: u64,
) -> (Vec<LabeledDonation>, Vec<LabeledDonation>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut is_test = vec![false; dataset.len()];

    for label in [FraudLabel::Legit, FraudLabel::Fraud] {
        let mut members: Vec<usize> = dataset
            .iter()
            .enumerate()
            .filter(|(_, d)| d.label == label)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            continue;
        }
        members.shuffle(&mut rng);

        let held_out = ((members.len() as f64 * test_size).round() as usize)
            .clamp(1, members.len() - 1);
        for &i in &members[..held_out] {
            is_test[i] = true;
        }
    }

    let (test, train): (Vec<_>, Vec<_>) = dataset
        .iter()
        .cloned()
        .zip(is_test)
        .partition(|(_, test)| *test);
    (
        train.into_iter().map(|(d, _)| d).collect(),
        test.into_iter().map(|(d, _)| d).collect(),
    )
}

/// Output of a training run
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub pipeline: FittedPipeline,
    pub report: EvaluationReport,
}

/// Fit preprocessor and model, then evaluate on a held-out split.
///
/// The preprocessor sees every row; the model only the training split.
pub fn train(config: &AppConfig, dataset: &[LabeledDonation]) -> Result<TrainedPipeline> {
    let frauds = dataset.iter().filter(|d| d.label.is_fraud()).count();
    info!(
        rows = dataset.len(),
        frauds,
        strategy = config.model.algorithm.as_str(),
        "Training started"
    );

    let preprocessor = Preprocessor::from_config(config).fit(dataset)?;
    info!(features = preprocessor.n_features(), "Preprocessor fitted");

    let (train_split, test_split) =
        stratified_split(dataset, config.model.test_size, config.model.random_state);
    debug!(
        train = train_split.len(),
        test = test_split.len(),
        "Stratified split"
    );

    let train_records: Vec<DonationRecord> =
        train_split.into_iter().map(|d| d.record).collect();
    let train_features = preprocessor.transform(&train_records)?.features;
    let model = AnomalyModel::fit(&config.model, &train_features.view())?;

    let test_records: Vec<DonationRecord> = test_split.iter().map(|d| d.record.clone()).collect();
    let actual: Vec<bool> = test_split.iter().map(|d| d.label.is_fraud()).collect();
    let test_features = preprocessor.transform(&test_records)?.features;
    let scores = model.score(&test_features.view())?;
    let predicted: Vec<bool> = scores.labels.iter().map(|l| l.is_outlier()).collect();

    let report = EvaluationReport::compute(&actual, &predicted, &scores.fraud_scores);
    report.log_summary();

    Ok(TrainedPipeline {
        pipeline: FittedPipeline {
            preprocessor,
            model,
        },
        report,
    })
}

/// Write both fitted artifacts
pub fn persist(trained: &TrainedPipeline, store: &ArtifactStore) -> Result<()> {
    store.save(&trained.pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::DonationGenerator;
    use std::fs;

    #[test]
    fn test_split_keeps_class_ratio() {
        let dataset = DonationGenerator::new(3).unwrap().generate_batch(1000);
        let frauds = dataset.iter().filter(|d| d.label.is_fraud()).count();
        let (train, test) = stratified_split(&dataset, 0.2, 42);

        assert_eq!(train.len() + test.len(), dataset.len());
        let test_frauds = test.iter().filter(|d| d.label.is_fraud()).count();
        let expected = (frauds as f64 * 0.2).round() as usize;
        assert_eq!(test_frauds, expected.clamp(1, frauds - 1));
    }

    #[test]
    fn test_split_is_seeded() {
        let dataset = DonationGenerator::new(3).unwrap().generate_batch(200);
        let (_, a) = stratified_split(&dataset, 0.25, 9);
        let (_, b) = stratified_split(&dataset, 0.25, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dataset_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.csv");
        let dataset = DonationGenerator::new(5).unwrap().generate_batch(25);

        write_dataset(&path, &dataset).unwrap();
        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded.len(), dataset.len());
        assert_eq!(loaded[3].record.donation_id, dataset[3].record.donation_id);
        assert_eq!(loaded[3].label, dataset[3].label);
    }

    #[test]
    fn test_loads_capitalized_booleans_and_empty_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.csv");
        fs::write(
            &path,
            "donation_id,amount,donation_time,donor_comment,donation_frequency_from_ip,\
             device_type,geo_distance_from_campaign,is_donor_anonymous,campaign_age,label\n\
             don_000000,12.5,2024-03-01 10:00:00,,2,mobile,40.1,True,100,0\n\
             don_000001,900.0,2024-03-02 11:00:00,Keep up the good work!,9,tablet,6000.0,False,20,1\n",
        )
        .unwrap();

        let dataset = load_dataset(&path).unwrap();
        assert!(dataset[0].record.is_donor_anonymous);
        assert_eq!(dataset[0].record.donor_comment, "");
        assert!(!dataset[1].record.is_donor_anonymous);
        assert!(dataset[1].label.is_fraud());
    }

    #[test]
    fn test_bad_label_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donations.csv");
        fs::write(
            &path,
            "donation_id,amount,donation_time,donor_comment,donation_frequency_from_ip,\
             device_type,geo_distance_from_campaign,is_donor_anonymous,campaign_age,label\n\
             don_000000,12.5,2024-03-01 10:00:00,,2,mobile,40.1,true,100,7\n",
        )
        .unwrap();

        let err = load_dataset(&path).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_train_produces_consistent_pipeline() {
        let dataset = DonationGenerator::new(42).unwrap().generate_batch(600);
        let trained = train(&AppConfig::default(), &dataset).unwrap();

        trained.pipeline.check_schema().unwrap();
        assert!(trained.report.samples > 0);
        assert!(trained.report.samples < dataset.len());
    }
}
