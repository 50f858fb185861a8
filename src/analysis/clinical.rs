use std::fmt;

use serde::{Deserialize, Serialize};

/// Clinical tier of a molar/premolar width difference, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Significance {
    Normal,
    Moderate,
    Significant,
    #[serde(rename = "Highly Significant")]
    HighlySignificant,
}

impl Significance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Significance::Normal => "Normal",
            Significance::Moderate => "Moderate",
            Significance::Significant => "Significant",
            Significance::HighlySignificant => "Highly Significant",
        }
    }
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier from the absolute difference in millimetres
pub fn classify_significance(difference_mm: f64) -> Significance {
    let diff = difference_mm.abs();
    if diff > 3.0 {
        Significance::HighlySignificant
    } else if diff > 2.0 {
        Significance::Significant
    } else if diff > 1.0 {
        Significance::Moderate
    } else {
        Significance::Normal
    }
}

pub fn recommendations(difference_mm: f64, abs_percentage: f64) -> Vec<String> {
    let lines: &[&str] = match classify_significance(difference_mm) {
        Significance::HighlySignificant => &[
            "Significant width discrepancy detected (>3mm)",
            "Space maintainer placement strongly recommended",
            "Immediate orthodontic consultation advised",
            "Monitor for potential crowding issues",
        ],
        Significance::Significant => &[
            "Moderate width discrepancy detected (2-3mm)",
            "Consider space maintainer placement",
            "Orthodontic consultation recommended",
            "Regular monitoring advised",
        ],
        Significance::Moderate => &[
            "Minor width discrepancy detected (1-2mm)",
            "Monitor eruption pattern closely",
            "Consider preventive measures",
            "Regular follow-up recommended",
        ],
        Significance::Normal => &[
            "Normal width relationship detected",
            "Continue routine monitoring",
            "No immediate intervention required",
        ],
    };

    let mut out: Vec<String> = lines.iter().map(|s| s.to_string()).collect();
    if abs_percentage > 30.0 {
        out.push("Percentage difference >30% indicates high risk".to_string());
    } else if abs_percentage > 20.0 {
        out.push("Percentage difference >20% requires attention".to_string());
    }
    out
}

/// Interpretation of one molar/premolar width pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalAssessment {
    pub molar_width_mm: f64,
    pub premolar_width_mm: f64,
    pub difference_mm: f64,
    /// Difference relative to the premolar width, in percent
    pub percentage: f64,
    pub significance: Significance,
    pub recommendations: Vec<String>,
}

pub fn assess(molar_width_mm: f64, premolar_width_mm: f64) -> ClinicalAssessment {
    let difference_mm = molar_width_mm - premolar_width_mm;
    let percentage = if premolar_width_mm > 0.0 {
        difference_mm / premolar_width_mm * 100.0
    } else {
        0.0
    };

    ClinicalAssessment {
        molar_width_mm,
        premolar_width_mm,
        difference_mm,
        percentage,
        significance: classify_significance(difference_mm),
        recommendations: recommendations(difference_mm, percentage.abs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(classify_significance(1.0), Significance::Normal);
        assert_eq!(classify_significance(1.01), Significance::Moderate);
        assert_eq!(classify_significance(2.0), Significance::Moderate);
        assert_eq!(classify_significance(-2.5), Significance::Significant);
        assert_eq!(classify_significance(3.0), Significance::Significant);
        assert_eq!(classify_significance(3.2), Significance::HighlySignificant);
    }

    #[test]
    fn test_tier_is_monotonic() {
        let mut previous = Significance::Normal;
        for step in 0..=600 {
            let tier = classify_significance(step as f64 * 0.01);
            assert!(tier >= previous, "tier dropped at {}", step as f64 * 0.01);
            previous = tier;
        }
    }

    #[test]
    fn test_assess_moderate_difference() {
        let a = assess(9.6, 7.68);
        assert_relative_eq!(a.difference_mm, 1.92, epsilon = 1e-9);
        assert_relative_eq!(a.percentage, 25.0, epsilon = 1e-9);
        assert_eq!(a.significance, Significance::Moderate);
        assert_eq!(a.recommendations.len(), 5);
        assert_eq!(
            a.recommendations.last().map(String::as_str),
            Some("Percentage difference >20% requires attention")
        );
    }

    #[test]
    fn test_normal_tier_has_three_lines() {
        let a = assess(8.0, 7.9);
        assert_eq!(a.significance, Significance::Normal);
        assert_eq!(a.recommendations.len(), 3);
    }

    #[test]
    fn test_zero_premolar_width_gives_zero_percentage() {
        let a = assess(9.0, 0.0);
        assert_eq!(a.percentage, 0.0);
        assert_eq!(a.significance, Significance::HighlySignificant);
        assert_eq!(a.recommendations.len(), 4);
    }

    #[test]
    fn test_high_risk_addendum() {
        let recs = recommendations(3.5, 45.0);
        assert!(recs.contains(&"Percentage difference >30% indicates high risk".to_string()));
    }

    #[test]
    fn test_serialized_tier_names() {
        let json = serde_json::to_string(&Significance::HighlySignificant).unwrap();
        assert_eq!(json, "\"Highly Significant\"");
    }
}
