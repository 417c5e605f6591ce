//! Seeded generator of labeled donations for fixtures and demos

use crate::error::{Error, Result};
use crate::types::{DonationRecord, FraudLabel, LabeledDonation};
use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::{Exp, LogNormal, Poisson};

const COMMENTS: [&str; 4] = [
    "Great cause! Happy to help.",
    "Hope this makes a difference.",
    "Keep up the good work!",
    "For a better tomorrow.",
];
const DEVICES: [&str; 3] = ["desktop", "mobile", "tablet"];
const CAMPAIGNS: usize = 50;

/// Produces donations whose fraud label follows a rule-based probability
pub struct DonationGenerator {
    rng: StdRng,
    reference: DateTime<Utc>,
    /// Days between each campaign start and the reference time
    campaign_starts: Vec<i64>,
    amount: LogNormal<f64>,
    frequency: Poisson<f64>,
    distance: Exp<f64>,
    counter: u64,
}

impl DonationGenerator {
    pub fn new(seed: u64) -> Result<Self> {
        Self::with_reference(seed, Utc::now())
    }

    /// Generator whose donation times are drawn from the 30 days before `reference`
    pub fn with_reference(seed: u64, reference: DateTime<Utc>) -> Result<Self> {
        let amount = LogNormal::new(3.5, 1.2)
            .map_err(|e| Error::Configuration(format!("amount distribution: {}", e)))?;
        let frequency = Poisson::new(1.5)
            .map_err(|e| Error::Configuration(format!("frequency distribution: {}", e)))?;
        let distance = Exp::new(1.0 / 500.0)
            .map_err(|e| Error::Configuration(format!("distance distribution: {}", e)))?;

        let mut rng = StdRng::seed_from_u64(seed);
        let campaign_starts = (0..CAMPAIGNS).map(|_| rng.gen_range(30..=365)).collect();

        Ok(Self {
            rng,
            reference,
            campaign_starts,
            amount,
            frequency,
            distance,
            counter: 0,
        })
    }

    /// Draw one labeled donation
    pub fn generate(&mut self) -> LabeledDonation {
        let donation_id = format!("don_{:06}", self.counter);
        self.counter += 1;

        let amount = (self.amount.sample(&mut self.rng) * 100.0).round() / 100.0;
        let seconds_ago = self.rng.gen_range(0..30 * 24 * 3600);
        let donation_time = self.reference - Duration::seconds(seconds_ago);

        let comment = if self.rng.gen_bool(0.8) {
            COMMENTS[self.rng.gen_range(0..COMMENTS.len())]
        } else {
            ""
        };
        let frequency = self.frequency.sample(&mut self.rng) as u32;
        let device = DEVICES[self.rng.gen_range(0..DEVICES.len())];
        let distance = self.distance.sample(&mut self.rng);
        let anonymous = self.rng.gen_bool(0.3);

        let campaign_start = self.campaign_starts[self.rng.gen_range(0..self.campaign_starts.len())];
        let campaign_age = (campaign_start - seconds_ago / (24 * 3600)).max(0) as u32;

        let mut record = DonationRecord::new(amount, device)
            .with_id(&donation_id)
            .with_comment(comment)
            .with_frequency(frequency)
            .with_distance(distance)
            .with_anonymous(anonymous)
            .with_campaign_age(campaign_age);
        record.donation_time = donation_time.format("%Y-%m-%d %H:%M:%S").to_string();

        let jitter = self.rng.gen_range(-0.1..0.1);
        let probability = (fraud_probability(&record) + jitter).clamp(0.0, 1.0);
        let label = if self.rng.gen::<f64>() < probability {
            FraudLabel::Fraud
        } else {
            FraudLabel::Legit
        };

        LabeledDonation::new(record, label)
    }

    /// Draw `count` labeled donations
    pub fn generate_batch(&mut self, count: usize) -> Vec<LabeledDonation> {
        (0..count).map(|_| self.generate()).collect()
    }
}

/// Rule-based fraud probability before jitter, may exceed 1
pub fn fraud_probability(record: &DonationRecord) -> f64 {
    let frequency = record.donation_frequency_from_ip;
    let distance = record.geo_distance_from_campaign;
    let mut probability = 0.0;

    if frequency > 8 {
        probability += 0.6;
    } else if frequency > 5 {
        probability += 0.4;
    }

    if distance > 5000.0 {
        probability += 0.7;
    } else if distance > 2000.0 {
        probability += 0.5;
    }

    if record.is_donor_anonymous && record.amount > 1000.0 {
        probability += 0.8;
    } else if record.is_donor_anonymous && record.amount > 500.0 {
        probability += 0.6;
    }

    if record.donor_comment.is_empty() && (frequency > 3 || distance > 1000.0) {
        probability += 0.4;
    }

    if record.amount > 2000.0 {
        probability += 0.5;
    }

    probability
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_donations() {
        let reference = Utc::now();
        let a = DonationGenerator::with_reference(42, reference).unwrap().generate_batch(50);
        let b = DonationGenerator::with_reference(42, reference).unwrap().generate_batch(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ids_are_sequential() {
        let batch = DonationGenerator::new(1).unwrap().generate_batch(3);
        let ids: Vec<_> = batch
            .iter()
            .map(|d| d.record.donation_id.clone().unwrap())
            .collect();
        assert_eq!(ids, ["don_000000", "don_000001", "don_000002"]);
    }

    #[test]
    fn test_values_stay_in_domain() {
        for donation in DonationGenerator::new(7).unwrap().generate_batch(500) {
            let record = &donation.record;
            assert!(record.amount >= 0.0);
            assert!(record.geo_distance_from_campaign >= 0.0);
            assert!(DEVICES.contains(&record.device_type.as_str()));
            assert!(record.donor_comment.is_empty() || COMMENTS.contains(&record.donor_comment.as_str()));
            assert!(record.campaign_age <= 365);
        }
    }

    #[test]
    fn test_fraud_is_a_minority() {
        let batch = DonationGenerator::new(42).unwrap().generate_batch(2000);
        let frauds = batch.iter().filter(|d| d.label.is_fraud()).count();
        assert!(frauds > 0);
        assert!(frauds < 1000);
    }

    #[test]
    fn test_fraud_probability_rules() {
        let quiet = DonationRecord::new(20.0, "desktop").with_comment("Hope this makes a difference.");
        assert_eq!(fraud_probability(&quiet), 0.0);

        let loud = DonationRecord::new(2500.0, "mobile")
            .with_frequency(9)
            .with_distance(6000.0)
            .with_anonymous(true);
        // 0.6 + 0.7 + 0.8 + 0.4 + 0.5
        assert!((fraud_probability(&loud) - 3.0).abs() < 1e-12);
    }
}
