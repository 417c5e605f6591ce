//! Type definitions for the donation fraud detector

pub mod donation;
pub mod outcome;

pub use donation::{DonationRecord, FraudLabel, LabeledDonation};
pub use outcome::{ErrorResponse, PredictionOutcome, PredictionResponse, ProcessedData};
