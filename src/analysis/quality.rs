//! Plausibility review of a finished measurement. Findings are advisory and
//! never fail the analysis.

use crate::config::QualityConfig;

pub fn review(
    molar_width_mm: f64,
    premolar_width_mm: f64,
    pair_distance_px: f64,
    config: &QualityConfig,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for (name, width) in [("molar", molar_width_mm), ("premolar", premolar_width_mm)] {
        if width < config.min_width_mm || width > config.max_width_mm {
            warnings.push(format!(
                "{name} width {width:.2} mm is outside the plausible range {:.1}-{:.1} mm",
                config.min_width_mm, config.max_width_mm
            ));
        }
    }

    let difference = (molar_width_mm - premolar_width_mm).abs();
    if difference > config.max_width_difference_mm {
        warnings.push(format!(
            "width difference {difference:.2} mm exceeds {:.1} mm",
            config.max_width_difference_mm
        ));
    }

    if pair_distance_px < config.min_pair_distance_px
        || pair_distance_px > config.max_pair_distance_px
    {
        warnings.push(format!(
            "tooth centroids are {pair_distance_px:.0} px apart, expected {:.0}-{:.0} px",
            config.min_pair_distance_px, config.max_pair_distance_px
        ));
    }

    warnings
}
