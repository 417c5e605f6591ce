//! Request handling for the line-oriented scoring loop

use crate::detector::Detector;
use crate::error::Error;
use crate::explain::explain;
use crate::metrics::ScoringMetrics;
use crate::types::{ErrorResponse, PredictionResponse};
use crate::validation;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Validate, score and explain one payload, returning the JSON response line.
///
/// Validation failures answer 400, load failures 503, other scoring
/// failures 500.
pub fn score_line(
    detector: &Detector,
    metrics: &ScoringMetrics,
    line: &str,
) -> serde_json::Result<String> {
    let started = Instant::now();

    let payload: Value = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(e) => {
            metrics.record_rejected();
            warn!(error = %e, "Malformed donation payload");
            return reject(None, 400, format!("malformed JSON: {}", e));
        }
    };
    let donation_id = payload
        .get("donation_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let record = match validation::parse_donation(&payload) {
        Ok(record) => record,
        Err(e) => {
            metrics.record_rejected();
            warn!(donation_id = ?donation_id, error = %e, "Donation rejected");
            return reject(donation_id, 400, e.to_string());
        }
    };

    match detector.predict(&record) {
        Ok(outcome) => {
            metrics.record_prediction(started.elapsed(), outcome.is_fraud);
            let explanation = explain(&outcome);
            if outcome.is_fraud {
                info!(
                    donation_id = ?outcome.donation_id,
                    fraud_score = outcome.fraud_score,
                    "Potential fraud flagged"
                );
            } else {
                debug!(
                    donation_id = ?outcome.donation_id,
                    fraud_score = outcome.fraud_score,
                    "Donation processed (legitimate)"
                );
            }
            serde_json::to_string(&PredictionResponse::from(
                outcome.with_explanation(explanation),
            ))
        }
        Err(e) => {
            metrics.record_failure();
            let status = match e {
                Error::Load(_) => 503,
                _ => 500,
            };
            reject(donation_id, status, e.to_string())
        }
    }
}

fn reject(donation_id: Option<String>, status: u16, detail: String) -> serde_json::Result<String> {
    serde_json::to_string(&ErrorResponse {
        donation_id,
        status,
        detail,
    })
}

/// Releases responses in input order as out-of-order completions arrive
#[derive(Debug, Default)]
pub struct ResponseSequencer {
    next: u64,
    pending: BTreeMap<u64, String>,
}

impl ResponseSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the response to input `seq` and return every response that
    /// is now ready, in order
    pub fn push(&mut self, seq: u64, response: String) -> Vec<String> {
        self.pending.insert(seq, response);
        let mut ready = Vec::new();
        while let Some(response) = self.pending.remove(&self.next) {
            ready.push(response);
            self.next += 1;
        }
        ready
    }

    /// Responses held back waiting for an earlier one
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::ArtifactStore;
    use crate::synthetic::DonationGenerator;
    use crate::training;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn unloaded() -> (tempfile::TempDir, Detector) {
        let dir = tempfile::tempdir().unwrap();
        let detector = Detector::new(ArtifactStore::in_dir(dir.path()));
        (dir, detector)
    }

    fn payload() -> Value {
        json!({
            "donation_id": "don_000321",
            "amount": 25.0,
            "donation_time": "2024-03-01T10:00:00Z",
            "donor_comment": "Great cause! Happy to help.",
            "donation_frequency_from_ip": 1,
            "device_type": "desktop",
            "geo_distance_from_campaign": 10.0,
            "is_donor_anonymous": false,
            "campaign_age": 150
        })
    }

    fn respond(detector: &Detector, metrics: &ScoringMetrics, line: &str) -> Value {
        serde_json::from_str(&score_line(detector, metrics, line).unwrap()).unwrap()
    }

    #[test]
    fn test_malformed_json_is_client_error() {
        let (_dir, detector) = unloaded();
        let metrics = ScoringMetrics::new();

        let response = respond(&detector, &metrics, "{\"amount\": ");
        assert_eq!(response["status"], 400);
        assert!(response["donation_id"].is_null());
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_missing_field_rejected_without_loading() {
        let (_dir, detector) = unloaded();
        let metrics = ScoringMetrics::new();
        let mut value = payload();
        value.as_object_mut().unwrap().remove("device_type");

        let response = respond(&detector, &metrics, &value.to_string());
        assert_eq!(response["status"], 400);
        assert_eq!(response["donation_id"], "don_000321");
        assert!(response["detail"].as_str().unwrap().contains("device_type"));
        assert!(!detector.is_loaded());
    }

    #[test]
    fn test_missing_artifacts_are_unavailable() {
        let (_dir, detector) = unloaded();
        let metrics = ScoringMetrics::new();

        let response = respond(&detector, &metrics, &payload().to_string());
        assert_eq!(response["status"], 503);
        assert_eq!(response["donation_id"], "don_000321");
        assert_eq!(metrics.failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_scored_donation_carries_explanation() {
        let dataset = DonationGenerator::new(42).unwrap().generate_batch(500);
        let trained = training::train(&AppConfig::default(), &dataset).unwrap();
        let detector = Detector::from_fitted(trained.pipeline).unwrap();
        let metrics = ScoringMetrics::new();

        let response = respond(&detector, &metrics, &payload().to_string());
        assert_eq!(response["donation_id"], "don_000321");
        assert_eq!(response["is_fraud"], false);
        assert!(response["explanation"]
            .as_str()
            .unwrap()
            .starts_with("Legitimate Donation"));
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_sequencer_restores_input_order() {
        let mut sequencer = ResponseSequencer::new();

        assert!(sequencer.push(1, "b".to_string()).is_empty());
        assert!(sequencer.push(2, "c".to_string()).is_empty());
        assert_eq!(sequencer.pending(), 2);

        assert_eq!(sequencer.push(0, "a".to_string()), ["a", "b", "c"]);
        assert_eq!(sequencer.push(3, "d".to_string()), ["d"]);
        assert_eq!(sequencer.pending(), 0);
    }
}
