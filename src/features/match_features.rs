//! Match feature representation for model input
//!
//! Every student-internship pairing is encoded as the same 15 features in the
//! same order, whether the record is being trained on or scored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Raw match record as produced by the allocation service
///
/// Every field is optional on the wire. Absent, `null` or unparseable values
/// resolve to zero / false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMatchRecord {
    #[serde(deserialize_with = "lenient_number")]
    pub skill_overlap_count: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub skill_overlap_ratio: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub avg_skill_level: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub max_skill_level: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub gpa: f64,
    #[serde(deserialize_with = "lenient_flag")]
    pub domain_match: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub location_match: bool,
    #[serde(deserialize_with = "lenient_number")]
    pub location_preference: f64,
    /// Internship duration in weeks
    #[serde(deserialize_with = "lenient_number")]
    pub duration: f64,
    /// Monthly stipend in currency units
    #[serde(deserialize_with = "lenient_number")]
    pub stipend: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub total_skills: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub verified_skills: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub past_allocations: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub past_avg_rating: f64,
}

/// Accept numbers, numeric strings and booleans; anything else is zero
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    Ok(if number.is_finite() { number } else { 0.0 })
}

/// Truthiness of a loosely typed flag
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |x| x != 0.0 && !x.is_nan()),
        Some(Value::String(s)) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Null) | None => false,
    })
}

/// Engineered features for a single pairing
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFeatures {
    pub skill_overlap_count: f64,
    pub skill_overlap_ratio: f64,
    pub avg_skill_level: f64,
    pub max_skill_level: f64,
    pub gpa: f64,
    /// GPA on a 10-point scale mapped to 0-1
    pub gpa_normalized: f64,
    /// 1.0 if the student's preferred domain matches the sector
    pub domain_match: f64,
    /// 1.0 if locations match
    pub location_match: f64,
    pub location_preference: f64,
    pub internship_duration: f64,
    /// Stipend in thousands
    pub stipend_amount: f64,
    pub total_skills: f64,
    pub verified_skills: f64,
    pub past_allocation_count: f64,
    pub past_avg_rating: f64,
}

impl MatchFeatures {
    /// Dimension of feature vector
    pub const DIM: usize = 15;

    /// Canonical feature names, in vector order
    pub const NAMES: [&'static str; Self::DIM] = [
        "skill_overlap_count",
        "skill_overlap_ratio",
        "avg_skill_level",
        "max_skill_level",
        "gpa",
        "gpa_normalized",
        "domain_match",
        "location_match",
        "location_preference",
        "internship_duration",
        "stipend_amount",
        "total_skills",
        "verified_skills",
        "past_allocation_count",
        "past_avg_rating",
    ];

    /// Create features from a raw record
    pub fn from_record(record: &RawMatchRecord) -> Self {
        MatchFeatures {
            skill_overlap_count: record.skill_overlap_count,
            skill_overlap_ratio: record.skill_overlap_ratio,
            avg_skill_level: record.avg_skill_level,
            max_skill_level: record.max_skill_level,
            gpa: record.gpa,
            gpa_normalized: record.gpa / 10.0,
            domain_match: flag(record.domain_match),
            location_match: flag(record.location_match),
            location_preference: record.location_preference,
            internship_duration: record.duration,
            stipend_amount: record.stipend / 1000.0,
            total_skills: record.total_skills,
            verified_skills: record.verified_skills,
            past_allocation_count: record.past_allocations,
            past_avg_rating: record.past_avg_rating,
        }
    }

    /// Convert to a flat vector in canonical order
    ///
    /// Non-finite values are replaced by zero.
    pub fn to_vec(&self) -> Vec<f64> {
        [
            self.skill_overlap_count,
            self.skill_overlap_ratio,
            self.avg_skill_level,
            self.max_skill_level,
            self.gpa,
            self.gpa_normalized,
            self.domain_match,
            self.location_match,
            self.location_preference,
            self.internship_duration,
            self.stipend_amount,
            self.total_skills,
            self.verified_skills,
            self.past_allocation_count,
            self.past_avg_rating,
        ]
        .into_iter()
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
    }

    /// Look up a feature by its canonical name
    pub fn value(&self, name: &str) -> Option<f64> {
        let idx = Self::index_of(name)?;
        Some(self.to_vec()[idx])
    }

    /// Position of a feature name in canonical order
    pub fn index_of(name: &str) -> Option<usize> {
        Self::NAMES.iter().position(|n| *n == name)
    }

    /// Canonical names as owned strings
    pub fn names() -> Vec<String> {
        Self::NAMES.iter().map(|n| n.to_string()).collect()
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
