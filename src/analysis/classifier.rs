//! Rule-based anatomical classification of tooth candidates.
//!
//! Every label owns a table of `(predicate, weight)` rules. A candidate's
//! score for a label is the sum of the weights whose predicate holds; the
//! label with the highest score wins unless it stays below the confidence
//! floor, in which case the candidate is `Other`.

use tracing::debug;

use crate::config::ClassificationConfig;
use crate::models::{ClassifiedTooth, ImageShape, LabelScores, ToothCandidate, ToothType};

/// Guards the floor comparison against accumulated rounding in rule sums
const SCORE_EPSILON: f64 = 1e-9;

/// Geometry of one candidate, normalised to the image it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub rel_x: f64,
    pub rel_y: f64,
    pub area: f64,
    pub area_percentile: f64,
    pub compactness: f64,
    pub aspect_ratio: f64,
}

impl Features {
    pub fn of(candidate: &ToothCandidate, shape: ImageShape) -> Self {
        let width = shape.width.max(1) as f64;
        let height = shape.height.max(1) as f64;
        Self {
            rel_x: candidate.centroid.x / width,
            rel_y: candidate.centroid.y / height,
            area: candidate.area,
            area_percentile: candidate.area_percentile,
            compactness: candidate.compactness,
            aspect_ratio: candidate.aspect_ratio,
        }
    }
}

type Predicate = fn(&Features, &ClassificationConfig) -> bool;

/// One scoring rule of a label table
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub weight: f64,
    pub applies: Predicate,
}

impl Rule {
    fn new(name: &'static str, weight: f64, applies: Predicate) -> Self {
        Self {
            name,
            weight,
            applies,
        }
    }
}

fn is_large(f: &Features, c: &ClassificationConfig) -> bool {
    f.area_percentile > c.large_percentile
}

fn is_medium(f: &Features, c: &ClassificationConfig) -> bool {
    f.area_percentile > c.medium_percentile && !is_large(f, c)
}

fn is_small(f: &Features, c: &ClassificationConfig) -> bool {
    f.area_percentile <= c.medium_percentile
}

pub fn molar_rules(config: &ClassificationConfig) -> [Rule; 7] {
    let w = &config.weights;
    [
        Rule::new("posterior band", w.posterior, |f, c| {
            c.posterior_region.contains(f.rel_x)
        }),
        Rule::new("far posterior", w.posterior_bonus, |f, c| {
            c.posterior_region.contains(f.rel_x) && f.rel_x > c.posterior_bonus_from
        }),
        Rule::new("molar vertical band", w.molar_vertical, |f, c| {
            c.molar_vertical.contains(f.rel_y)
        }),
        Rule::new("large area", w.large_molar, is_large),
        Rule::new("medium area", w.medium_molar, is_medium),
        Rule::new("compact", w.compact_molar, |f, c| {
            f.compactness > c.compactness_threshold
        }),
        Rule::new("square aspect", w.molar_aspect, |f, c| {
            c.molar_aspect.contains(f.aspect_ratio)
        }),
    ]
}

pub fn premolar_rules(config: &ClassificationConfig) -> [Rule; 7] {
    let w = &config.weights;
    [
        Rule::new("middle band", w.middle, |f, c| c.middle_region.contains(f.rel_x)),
        Rule::new("central band", w.central_bonus, |f, c| {
            c.middle_region.contains(f.rel_x) && c.central_region.contains(f.rel_x)
        }),
        Rule::new("premolar vertical band", w.premolar_vertical, |f, c| {
            c.premolar_vertical.contains(f.rel_y)
        }),
        Rule::new("medium area", w.medium_premolar, is_medium),
        Rule::new("small area", w.small_premolar, is_small),
        Rule::new("compact", w.compact_premolar, |f, c| {
            f.compactness > c.compactness_threshold
        }),
        // Only counts when the aspect is not already square enough for a molar
        Rule::new("elongated aspect", w.premolar_aspect, |f, c| {
            c.premolar_aspect.contains(f.aspect_ratio) && !c.molar_aspect.contains(f.aspect_ratio)
        }),
    ]
}

/// Sum of the weights of all rules that apply
pub fn evaluate(rules: &[Rule], features: &Features, config: &ClassificationConfig) -> f64 {
    rules
        .iter()
        .filter(|r| (r.applies)(features, config))
        .map(|r| r.weight)
        .sum()
}

/// Names of the rules that fired, for diagnostics
pub fn matched_rules(
    rules: &[Rule],
    features: &Features,
    config: &ClassificationConfig,
) -> Vec<&'static str> {
    rules
        .iter()
        .filter(|r| (r.applies)(features, config))
        .map(|r| r.name)
        .collect()
}

pub fn label_scores(features: &Features, config: &ClassificationConfig) -> LabelScores {
    LabelScores {
        primary_molar: evaluate(&molar_rules(config), features, config),
        premolar: evaluate(&premolar_rules(config), features, config),
        other: 0.0,
    }
}

/// Highest-scoring label; ties go to the earlier of molar, premolar, other.
/// Scores under the floor yield `Other`.
pub fn select_label(scores: &LabelScores, confidence_floor: f64) -> ToothType {
    let ranked = [
        (ToothType::PrimaryMolar, scores.primary_molar),
        (ToothType::Premolar, scores.premolar),
        (ToothType::Other, scores.other),
    ];

    let mut best = ranked[0];
    for entry in &ranked[1..] {
        if entry.1 > best.1 {
            best = *entry;
        }
    }

    if best.1 + SCORE_EPSILON < confidence_floor {
        ToothType::Other
    } else {
        best.0
    }
}

/// Detection confidence: a capped composite of size, shape, vertical position
/// and aspect ratio plausibility
pub fn detection_confidence(features: &Features, config: &ClassificationConfig) -> f64 {
    let c = &config.confidence;
    let mut confidence = c.base;

    if c.optimal_area.contains(features.area) {
        confidence += c.optimal_area_bonus;
    } else if c.acceptable_area.contains(features.area) {
        confidence += c.acceptable_area_bonus;
    }

    if features.compactness > c.strong_compactness {
        confidence += c.strong_compactness_bonus;
    } else if features.compactness > c.weak_compactness {
        confidence += c.weak_compactness_bonus;
    }

    if c.core_vertical.contains_strict(features.rel_y) {
        confidence += c.core_vertical_bonus;
    } else if c.outer_vertical.contains_strict(features.rel_y) {
        confidence += c.outer_vertical_bonus;
    }

    if c.aspect.contains(features.aspect_ratio) {
        confidence += c.aspect_bonus;
    }

    confidence.min(1.0)
}

/// Classify one candidate
pub fn classify(
    candidate: &ToothCandidate,
    shape: ImageShape,
    config: &ClassificationConfig,
) -> ClassifiedTooth {
    let features = Features::of(candidate, shape);
    let scores = label_scores(&features, config);
    let label = select_label(&scores, config.confidence_floor);
    let confidence = detection_confidence(&features, config);

    debug!(
        rel_x = features.rel_x,
        rel_y = features.rel_y,
        molar = scores.primary_molar,
        premolar = scores.premolar,
        %label,
        "classified region"
    );

    ClassifiedTooth {
        candidate: candidate.clone(),
        label,
        confidence,
        scores,
    }
}

/// Classify every candidate, keeping input order. `Other` results are kept
/// here and dropped by the pairing stage.
pub fn classify_all(
    candidates: &[ToothCandidate],
    shape: ImageShape,
    config: &ClassificationConfig,
) -> Vec<ClassifiedTooth> {
    candidates
        .iter()
        .map(|c| classify(c, shape, config))
        .collect()
}
