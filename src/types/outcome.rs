//! Prediction outcome data structures

use crate::types::donation::DonationRecord;
use serde::{Deserialize, Serialize};

/// Record values as seen by the pipeline, before encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    #[serde(flatten)]
    pub record: DonationRecord,

    /// Compound polarity of the donor comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
}

/// Result of scoring one donation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub donation_id: Option<String>,

    /// Whether the donation was flagged as an outlier
    pub is_fraud: bool,

    /// Anomaly measure, higher = more suspicious
    pub fraud_score: f64,

    pub processed_data: ProcessedData,

    /// Human-readable reasons, attached by the caller
    pub explanation: Option<String>,
}

impl PredictionOutcome {
    pub fn new(is_fraud: bool, fraud_score: f64, processed_data: ProcessedData) -> Self {
        Self {
            donation_id: processed_data.record.donation_id.clone(),
            is_fraud,
            fraud_score,
            processed_data,
            explanation: None,
        }
    }

    /// Attach explanation text to the outcome
    pub fn with_explanation(mut self, explanation: String) -> Self {
        self.explanation = Some(explanation);
        self
    }
}

/// Wire response for one scored donation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub donation_id: Option<String>,
    pub is_fraud: bool,
    pub fraud_score: f64,
    pub explanation: String,
}

impl From<PredictionOutcome> for PredictionResponse {
    fn from(outcome: PredictionOutcome) -> Self {
        Self {
            donation_id: outcome.donation_id,
            is_fraud: outcome.is_fraud,
            fraud_score: outcome.fraud_score,
            explanation: outcome.explanation.unwrap_or_default(),
        }
    }
}

/// Wire response for a payload that could not be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub donation_id: Option<String>,
    /// HTTP-style status code (400 client error, 500/503 server side)
    pub status: u16,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_passes_donation_id_through() {
        let record = DonationRecord::new(40.0, "mobile").with_id("don_42");
        let outcome = PredictionOutcome::new(
            false,
            -0.12,
            ProcessedData {
                record,
                sentiment_score: Some(0.4),
            },
        )
        .with_explanation("Legitimate Donation (Score: -0.120)".to_string());

        let response = PredictionResponse::from(outcome);
        assert_eq!(response.donation_id.as_deref(), Some("don_42"));
        assert_eq!(response.explanation, "Legitimate Donation (Score: -0.120)");
    }

    #[test]
    fn test_processed_data_flattens_record() {
        let processed = ProcessedData {
            record: DonationRecord::new(10.0, "tablet"),
            sentiment_score: Some(-0.6),
        };
        let value = serde_json::to_value(&processed).unwrap();
        assert_eq!(value["device_type"], "tablet");
        assert_eq!(value["sentiment_score"], -0.6);
    }
}
