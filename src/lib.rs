//! Donation Fraud Detector Library
//!
//! Unsupervised anomaly scoring for charitable donations. Records are
//! standardized and one-hot encoded, scored by an isolation forest or a
//! local outlier factor model, and flagged donations are explained with
//! human-readable indicators.

pub mod config;
pub mod detector;
pub mod error;
pub mod evaluation;
pub mod explain;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod preprocess;
pub mod serving;
pub mod synthetic;
pub mod training;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use detector::Detector;
pub use error::{Error, Result};
pub use explain::{explain, FraudIndicator};
pub use feature_extractor::FeatureExtractor;
pub use models::{AnomalyModel, ArtifactStore, FittedPipeline};
pub use preprocess::{Preprocessor, PreprocessorState};
pub use types::{
    DonationRecord, ErrorResponse, FraudLabel, LabeledDonation, PredictionOutcome,
    PredictionResponse, ProcessedData,
};
