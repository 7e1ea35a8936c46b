//! Feature extraction and encoding
//!
//! Converts raw match records into model-ready features.

pub mod match_features;
pub mod pairing;

pub use match_features::{MatchFeatures, RawMatchRecord};
pub use pairing::{extract_record, normalize_rating, InternshipProfile, StudentProfile};
