//! Raw record extraction from student and internship profiles

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::match_features::RawMatchRecord;

/// A skill listed on a student profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSkill {
    pub name: String,
    /// Self-assessed proficiency
    #[serde(default)]
    pub level: f64,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentProfile {
    pub skills: Vec<StudentSkill>,
    pub gpa: Option<f64>,
    pub preferred_domain: Option<String>,
    pub preferred_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InternshipProfile {
    pub required_skills: Vec<String>,
    /// Sector of the hosting organisation
    pub sector: Option<String>,
    pub location: Option<String>,
    pub duration: Option<f64>,
    pub stipend: Option<f64>,
}

/// Build a raw match record for a student-internship pair
///
/// History fields are left at zero.
pub fn extract_record(student: &StudentProfile, internship: &InternshipProfile) -> RawMatchRecord {
    let levels: HashMap<String, f64> = student
        .skills
        .iter()
        .map(|s| (s.name.to_lowercase(), s.level))
        .collect();

    let mut overlap = 0usize;
    let mut total_level = 0.0;
    let mut max_level = 0.0f64;
    for required in &internship.required_skills {
        if let Some(level) = levels.get(&required.to_lowercase()) {
            overlap += 1;
            total_level += level;
            max_level = max_level.max(*level);
        }
    }

    let overlap_ratio = if internship.required_skills.is_empty() {
        0.0
    } else {
        overlap as f64 / internship.required_skills.len() as f64
    };
    let avg_level = if overlap > 0 {
        total_level / overlap as f64
    } else {
        0.0
    };

    let domain = lowered(&student.preferred_domain);
    let sector = lowered(&internship.sector);
    let domain_match = domain == sector;

    let preferred = lowered(&student.preferred_location);
    let location = lowered(&internship.location);
    let location_match = preferred == location || preferred == "remote" || location == "remote";

    RawMatchRecord {
        skill_overlap_count: overlap as f64,
        skill_overlap_ratio: overlap_ratio,
        avg_skill_level: avg_level,
        max_skill_level: max_level,
        gpa: student.gpa.unwrap_or(0.0),
        domain_match,
        location_match,
        location_preference: if location_match { 1.0 } else { 0.0 },
        duration: internship.duration.unwrap_or(0.0),
        stipend: internship.stipend.unwrap_or(0.0),
        total_skills: student.skills.len() as f64,
        verified_skills: student.skills.iter().filter(|s| s.is_verified).count() as f64,
        past_allocations: 0.0,
        past_avg_rating: 0.0,
    }
}

/// Map a 1-5 star rating onto the 0-1 target range
pub fn normalize_rating(overall: f64) -> f64 {
    ((overall - 1.0) / 4.0).clamp(0.0, 1.0)
}

fn lowered(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").to_lowercase()
}
