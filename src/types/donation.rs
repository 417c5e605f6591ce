//! Donation data structures

use serde::{Deserialize, Serialize};

/// A single donation event submitted for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    /// Opaque identifier passed through to the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_id: Option<String>,

    /// Donated amount
    pub amount: f64,

    /// When the donation was made, as submitted
    pub donation_time: String,

    /// Free-text comment, may be empty
    pub donor_comment: String,

    /// Donations seen from the same IP in the trailing window
    pub donation_frequency_from_ip: u32,

    /// Device category (desktop, mobile, tablet, ...)
    pub device_type: String,

    /// Distance between donor and campaign in km
    pub geo_distance_from_campaign: f64,

    /// Whether the donor chose to stay anonymous
    pub is_donor_anonymous: bool,

    /// Days since the campaign started
    pub campaign_age: u32,
}

impl DonationRecord {
    /// Create a record with neutral defaults for the behavioral fields
    pub fn new(amount: f64, device_type: &str) -> Self {
        Self {
            donation_id: None,
            amount,
            donation_time: chrono::Utc::now().to_rfc3339(),
            donor_comment: String::new(),
            donation_frequency_from_ip: 1,
            device_type: device_type.to_string(),
            geo_distance_from_campaign: 0.0,
            is_donor_anonymous: false,
            campaign_age: 0,
        }
    }

    pub fn with_id(mut self, donation_id: &str) -> Self {
        self.donation_id = Some(donation_id.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.donor_comment = comment.to_string();
        self
    }

    pub fn with_frequency(mut self, donations_from_ip: u32) -> Self {
        self.donation_frequency_from_ip = donations_from_ip;
        self
    }

    pub fn with_distance(mut self, km: f64) -> Self {
        self.geo_distance_from_campaign = km;
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.is_donor_anonymous = anonymous;
        self
    }

    pub fn with_campaign_age(mut self, days: u32) -> Self {
        self.campaign_age = days;
        self
    }
}

/// Ground-truth label of a training donation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudLabel {
    Legit,
    Fraud,
}

impl FraudLabel {
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(FraudLabel::Legit),
            1 => Some(FraudLabel::Fraud),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> u8 {
        match self {
            FraudLabel::Legit => 0,
            FraudLabel::Fraud => 1,
        }
    }

    pub fn is_fraud(&self) -> bool {
        matches!(self, FraudLabel::Fraud)
    }
}

/// A training donation with its evaluation label.
///
/// The label lives outside `DonationRecord`, so nothing that consumes
/// records for fitting or scoring can read it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDonation {
    pub record: DonationRecord,
    pub label: FraudLabel,
}

impl LabeledDonation {
    pub fn new(record: DonationRecord, label: FraudLabel) -> Self {
        Self { record, label }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = DonationRecord::new(25.0, "desktop")
            .with_id("don_000001")
            .with_comment("Keep up the good work!");

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: DonationRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(record, deserialized);
    }

    #[test]
    fn test_label_flags() {
        assert_eq!(FraudLabel::from_flag(1), Some(FraudLabel::Fraud));
        assert_eq!(FraudLabel::from_flag(0), Some(FraudLabel::Legit));
        assert_eq!(FraudLabel::from_flag(2), None);
        assert_eq!(FraudLabel::Fraud.as_flag(), 1);
    }
}
