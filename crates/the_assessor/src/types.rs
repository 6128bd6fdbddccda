//! Core types for vulnerability scoring.

use serde::{Deserialize, Serialize};

/// CVSS severity bucket, a pure function of the numeric score. Independent of
/// [`the_foundation::Severity`], which also carries the "derived when absent"
/// rule from and is the enum actually stored on a `Vulnerability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CvssSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl CvssSeverity {
    /// Get severity from CVSS base score.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s <= 0.0 => CvssSeverity::None,
            s if s < 4.0 => CvssSeverity::Low,
            s if s < 7.0 => CvssSeverity::Medium,
            s if s < 9.0 => CvssSeverity::High,
            _ => CvssSeverity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CvssSeverity::None => "None",
            CvssSeverity::Low => "Low",
            CvssSeverity::Medium => "Medium",
            CvssSeverity::High => "High",
            CvssSeverity::Critical => "Critical",
        }
    }
}

/// CVSS v3.x base metrics, as decoded from a vector string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvssV3Base {
    pub attack_vector: String,
    pub attack_complexity: String,
    pub privileges_required: String,
    pub user_interaction: String,
    pub scope: String,
    pub confidentiality: String,
    pub integrity: String,
    pub availability: String,
}

/// A fully resolved CVSS v3.x score plus its source vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvssV3 {
    pub base_metrics: CvssV3Base,
    pub base_score: f64,
    pub temporal_score: Option<f64>,
    pub environmental_score: Option<f64>,
    pub severity: CvssSeverity,
    pub vector_string: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_score() {
        assert_eq!(CvssSeverity::from_score(0.0), CvssSeverity::None);
        assert_eq!(CvssSeverity::from_score(3.5), CvssSeverity::Low);
        assert_eq!(CvssSeverity::from_score(5.0), CvssSeverity::Medium);
        assert_eq!(CvssSeverity::from_score(7.5), CvssSeverity::High);
        assert_eq!(CvssSeverity::from_score(9.8), CvssSeverity::Critical);
    }
}
