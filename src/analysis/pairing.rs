//! Matching primary molars to their successor premolars.
//!
//! Assignment is greedy and sequential: molars are visited in the order the
//! caller supplies, each takes its best-scoring premolar that is still free,
//! and that premolar is consumed. This is an accepted approximation, not a
//! global optimum over all pairings.

use tracing::debug;

use crate::config::PairingConfig;
use crate::models::{ClassifiedTooth, ToothPair, ToothType};

const SCORE_EPSILON: f64 = 1e-9;

/// Score how well a premolar fits next to a molar
pub fn anatomical_score(
    molar: &ClassifiedTooth,
    premolar: &ClassifiedTooth,
    config: &PairingConfig,
) -> f64 {
    let m = molar.candidate.centroid;
    let p = premolar.candidate.centroid;
    let dx = m.x - p.x;
    let distance = m.distance_to(&p);
    // Positive when the premolar centroid has the smaller image row
    let offset = m.y - p.y;

    let mut score = 0.0;

    if distance < config.proximity_px {
        score += config.proximity_weight;
    }

    if dx.abs() < config.horizontal_overlap_px {
        score += config.alignment_weight;
    }

    if offset > 0.0 && offset < config.below_window_px {
        score += config.below_weight;
    } else if offset.abs() < config.level_tolerance_px {
        score += config.level_weight;
    }

    if config.enforce_size_relationship {
        let size_ratio = if premolar.candidate.area > 0.0 {
            molar.candidate.area / premolar.candidate.area
        } else {
            0.0
        };
        if size_ratio > 1.0 + config.size_difference_threshold {
            score += config.size_weight;
        }
    }

    if m.x > p.x {
        score += config.posterior_weight;
    }

    score
}

/// Pair every molar with at most one unused premolar.
///
/// Teeth labelled `Other` are ignored. A premolar is accepted for a molar
/// only when its score beats both the best seen so far for that molar and the
/// acceptance floor.
pub fn validate_pairs(teeth: &[ClassifiedTooth], config: &PairingConfig) -> Vec<ToothPair> {
    let molars: Vec<&ClassifiedTooth> = teeth
        .iter()
        .filter(|t| t.label == ToothType::PrimaryMolar)
        .collect();
    let premolars: Vec<&ClassifiedTooth> = teeth
        .iter()
        .filter(|t| t.label == ToothType::Premolar)
        .collect();

    let mut consumed = vec![false; premolars.len()];
    let mut pairs = Vec::new();

    for molar in molars {
        let mut best: Option<(usize, f64)> = None;

        for (idx, premolar) in premolars.iter().enumerate() {
            if consumed[idx] {
                continue;
            }

            let score = anatomical_score(molar, premolar, config);
            let best_score = best.map_or(0.0, |(_, s)| s);
            if score > best_score + SCORE_EPSILON
                && score > config.acceptance_floor + SCORE_EPSILON
            {
                best = Some((idx, score));
            }
        }

        if let Some((idx, score)) = best {
            consumed[idx] = true;
            let premolar = premolars[idx];
            let pair_confidence = molar.confidence.min(premolar.confidence).min(score);

            debug!(
                anatomical_score = score,
                pair_confidence, "paired molar with premolar"
            );

            pairs.push(ToothPair {
                molar: molar.clone(),
                premolar: premolar.clone(),
                anatomical_score: score,
                pair_confidence,
            });
        }
    }

    pairs
}

/// Pair with the highest confidence; the first one wins ties
pub fn select_best(pairs: &[ToothPair]) -> Option<&ToothPair> {
    let mut best: Option<&ToothPair> = None;
    for pair in pairs {
        match best {
            Some(b) if pair.pair_confidence <= b.pair_confidence => {}
            _ => best = Some(pair),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contour, LabelScores, ToothCandidate};
    use approx::assert_relative_eq;
    use imageproc::point::Point;

    fn tooth(label: ToothType, cx: i32, cy: i32, half: i32, confidence: f64) -> ClassifiedTooth {
        let candidate = ToothCandidate::from_contour(Contour::new(vec![
            Point::new(cx - half, cy - half),
            Point::new(cx + half, cy - half),
            Point::new(cx + half, cy + half),
            Point::new(cx - half, cy + half),
        ]));
        ClassifiedTooth {
            candidate,
            label,
            confidence,
            scores: LabelScores::default(),
        }
    }

    #[test]
    fn test_ideal_pair_scores_every_rule() {
        let config = PairingConfig::default();
        let molar = tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9);
        let premolar = tooth(ToothType::Premolar, 570, 260, 20, 0.8);
        // proximity + alignment + vertical + size + posterior
        assert_relative_eq!(
            anatomical_score(&molar, &premolar, &config),
            0.3 + 0.2 + 0.3 + 0.2 + 0.1
        );
    }

    #[test]
    fn test_level_teeth_get_level_credit() {
        let config = PairingConfig::default();
        let molar = tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9);
        let premolar = tooth(ToothType::Premolar, 560, 310, 20, 0.8);
        assert_relative_eq!(
            anatomical_score(&molar, &premolar, &config),
            0.3 + 0.2 + 0.2 + 0.2 + 0.1
        );
    }

    #[test]
    fn test_premolar_lower_in_image_gets_no_vertical_credit() {
        let config = PairingConfig::default();
        let molar = tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9);
        let premolar = tooth(ToothType::Premolar, 580, 350, 20, 0.8);
        assert_relative_eq!(
            anatomical_score(&molar, &premolar, &config),
            0.3 + 0.2 + 0.2 + 0.1
        );
    }

    #[test]
    fn test_premolar_higher_in_image_is_paired() {
        let config = PairingConfig::default();
        let teeth = vec![
            tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9),
            tooth(ToothType::Premolar, 540, 230, 20, 0.8),
        ];
        // proximity + vertical + size + posterior; dx sits on the overlap limit
        let pairs = validate_pairs(&teeth, &config);
        assert_eq!(pairs.len(), 1);
        assert_relative_eq!(pairs[0].anatomical_score, 0.3 + 0.3 + 0.2 + 0.1);
    }

    #[test]
    fn test_pair_confidence_is_minimum() {
        let config = PairingConfig::default();
        let teeth = vec![
            tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9),
            tooth(ToothType::Premolar, 570, 260, 20, 0.7),
        ];
        let pairs = validate_pairs(&teeth, &config);
        assert_eq!(pairs.len(), 1);
        assert_relative_eq!(pairs[0].pair_confidence, 0.7);
        assert!(pairs[0].anatomical_score > config.acceptance_floor);
    }

    #[test]
    fn test_score_at_floor_is_rejected() {
        let config = PairingConfig::default();
        // Far apart horizontally: only vertical + size + posterior = 0.6
        let teeth = vec![
            tooth(ToothType::PrimaryMolar, 700, 300, 30, 0.9),
            tooth(ToothType::Premolar, 500, 260, 20, 0.9),
        ];
        assert!(validate_pairs(&teeth, &config).is_empty());
    }

    #[test]
    fn test_premolar_is_never_shared() {
        let config = PairingConfig::default();
        let teeth = vec![
            tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9),
            tooth(ToothType::PrimaryMolar, 610, 305, 30, 0.9),
            tooth(ToothType::Premolar, 570, 260, 20, 0.8),
        ];
        let pairs = validate_pairs(&teeth, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].molar.candidate.centroid.x, 600.0);
    }

    #[test]
    fn test_greedy_order_dependence() {
        let config = PairingConfig::default();
        // The first molar takes the only premolar the second one could use,
        // even though swapping would pair both.
        let teeth = vec![
            tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9),
            tooth(ToothType::PrimaryMolar, 700, 300, 30, 0.9),
            tooth(ToothType::Premolar, 640, 260, 20, 0.8),
            tooth(ToothType::Premolar, 520, 300, 20, 0.8),
        ];
        let pairs = validate_pairs(&teeth, &config);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].molar.candidate.centroid.x, 600.0);
        assert_eq!(pairs[0].premolar.candidate.centroid.x, 640.0);
    }

    #[test]
    fn test_other_teeth_are_ignored() {
        let config = PairingConfig::default();
        let teeth = vec![
            tooth(ToothType::Other, 600, 300, 30, 0.9),
            tooth(ToothType::Other, 570, 260, 20, 0.8),
        ];
        assert!(validate_pairs(&teeth, &config).is_empty());
    }

    #[test]
    fn test_select_best_prefers_first_on_tie() {
        let molar = tooth(ToothType::PrimaryMolar, 600, 300, 30, 0.9);
        let premolar = tooth(ToothType::Premolar, 570, 260, 20, 0.8);
        let make = |confidence: f64, score: f64| ToothPair {
            molar: molar.clone(),
            premolar: premolar.clone(),
            anatomical_score: score,
            pair_confidence: confidence,
        };
        let pairs = vec![make(0.7, 0.9), make(0.8, 0.9), make(0.8, 1.0)];
        let best = select_best(&pairs).unwrap();
        assert_relative_eq!(best.anatomical_score, 0.9);
        assert_relative_eq!(best.pair_confidence, 0.8);
        assert!(select_best(&[]).is_none());
    }
}
