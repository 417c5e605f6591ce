//! Human-readable fraud indicators for scored donations

use crate::types::PredictionOutcome;
use std::fmt;

const FREQUENCY_LIMIT: u32 = 5;
const DISTANCE_LIMIT_KM: f64 = 2000.0;
const ANONYMOUS_AMOUNT_LIMIT: f64 = 500.0;
const NEGATIVE_SENTIMENT_LIMIT: f64 = -0.5;

/// One reason a donation looks suspicious
#[derive(Debug, Clone, PartialEq)]
pub enum FraudIndicator {
    HighFrequency { donations: u32 },
    LargeDistance { km: f64 },
    LargeAnonymousDonation,
    MissingComment,
    NegativeSentiment,
    /// No single rule fired
    CombinedFactors,
}

impl fmt::Display for FraudIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FraudIndicator::HighFrequency { donations } => write!(
                f,
                "High donation frequency from this IP ({} donations)",
                donations
            ),
            FraudIndicator::LargeDistance { km } => write!(
                f,
                "Large geographic distance from campaign ({} km)",
                km.round() as i64
            ),
            FraudIndicator::LargeAnonymousDonation => write!(f, "Large anonymous donation"),
            FraudIndicator::MissingComment => write!(f, "Missing donor comment"),
            FraudIndicator::NegativeSentiment => write!(f, "Negative sentiment in comment"),
            FraudIndicator::CombinedFactors => {
                write!(f, "Combination of multiple suspicious factors")
            }
        }
    }
}

/// Indicators for a flagged donation, in fixed rule order.
///
/// Empty when the donation was not flagged.
pub fn reasons(outcome: &PredictionOutcome) -> Vec<FraudIndicator> {
    if !outcome.is_fraud {
        return Vec::new();
    }

    let data = &outcome.processed_data;
    let record = &data.record;
    let mut reasons = Vec::new();

    if record.donation_frequency_from_ip > FREQUENCY_LIMIT {
        reasons.push(FraudIndicator::HighFrequency {
            donations: record.donation_frequency_from_ip,
        });
    }
    if record.geo_distance_from_campaign > DISTANCE_LIMIT_KM {
        reasons.push(FraudIndicator::LargeDistance {
            km: record.geo_distance_from_campaign,
        });
    }
    if record.is_donor_anonymous && record.amount > ANONYMOUS_AMOUNT_LIMIT {
        reasons.push(FraudIndicator::LargeAnonymousDonation);
    }
    if record.donor_comment.trim().is_empty() {
        reasons.push(FraudIndicator::MissingComment);
    }
    if data
        .sentiment_score
        .is_some_and(|score| score < NEGATIVE_SENTIMENT_LIMIT)
    {
        reasons.push(FraudIndicator::NegativeSentiment);
    }
    if reasons.is_empty() {
        reasons.push(FraudIndicator::CombinedFactors);
    }

    reasons
}

/// Explanation text for a scored donation
pub fn explain(outcome: &PredictionOutcome) -> String {
    if !outcome.is_fraud {
        return format!("Legitimate Donation (Score: {:.3})", outcome.fraud_score);
    }

    let reasons: Vec<String> = reasons(outcome).iter().map(|r| r.to_string()).collect();
    format!(
        "Potential Fraud Detected (Score: {:.3})\nReasons: {}",
        outcome.fraud_score,
        reasons.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DonationRecord, ProcessedData};

    fn outcome(is_fraud: bool, record: DonationRecord, sentiment: Option<f64>) -> PredictionOutcome {
        PredictionOutcome::new(
            is_fraud,
            0.1234,
            ProcessedData {
                record,
                sentiment_score: sentiment,
            },
        )
    }

    #[test]
    fn test_all_rules_fire_in_order() {
        let record = DonationRecord::new(1000.0, "mobile")
            .with_frequency(10)
            .with_distance(6000.4)
            .with_anonymous(true);
        let found = reasons(&outcome(true, record, Some(0.0)));

        assert_eq!(
            found,
            vec![
                FraudIndicator::HighFrequency { donations: 10 },
                FraudIndicator::LargeDistance { km: 6000.4 },
                FraudIndicator::LargeAnonymousDonation,
                FraudIndicator::MissingComment,
            ]
        );
    }

    #[test]
    fn test_explanation_text() {
        let record = DonationRecord::new(1000.0, "mobile")
            .with_frequency(10)
            .with_distance(6000.4)
            .with_anonymous(true);
        let text = explain(&outcome(true, record, Some(0.0)));

        assert_eq!(
            text,
            "Potential Fraud Detected (Score: 0.123)\nReasons: \
             High donation frequency from this IP (10 donations); \
             Large geographic distance from campaign (6000 km); \
             Large anonymous donation; Missing donor comment"
        );
    }

    #[test]
    fn test_negative_sentiment_only_when_present() {
        let record = DonationRecord::new(20.0, "desktop").with_comment("what a scam");
        assert_eq!(
            reasons(&outcome(true, record.clone(), Some(-0.7))),
            vec![FraudIndicator::NegativeSentiment]
        );
        assert_eq!(
            reasons(&outcome(true, record, None)),
            vec![FraudIndicator::CombinedFactors]
        );
    }

    #[test]
    fn test_whitespace_comment_counts_as_missing() {
        let record = DonationRecord::new(20.0, "desktop").with_comment("   ");
        assert_eq!(
            reasons(&outcome(true, record, Some(0.0))),
            vec![FraudIndicator::MissingComment]
        );
    }

    #[test]
    fn test_fallback_reason() {
        let record = DonationRecord::new(20.0, "desktop").with_comment("Hope this helps");
        let text = explain(&outcome(true, record, Some(0.4)));
        assert!(text.ends_with("Reasons: Combination of multiple suspicious factors"));
    }

    #[test]
    fn test_legitimate_donation_lists_no_reasons() {
        let record = DonationRecord::new(1000.0, "desktop")
            .with_frequency(10)
            .with_anonymous(true);
        let legit = outcome(false, record, Some(0.0));

        assert!(reasons(&legit).is_empty());
        assert_eq!(explain(&legit), "Legitimate Donation (Score: 0.123)");
    }

    #[test]
    fn test_distance_rounds_to_nearest_km() {
        assert_eq!(
            FraudIndicator::LargeDistance { km: 2500.5 }.to_string(),
            "Large geographic distance from campaign (2501 km)"
        );
    }
}
