//! End-to-end leeway space analysis of one radiograph.
//!
//! The flow is strictly linear: enhance, extract candidates, classify,
//! pair, measure the best pair, interpret. Every stage is also callable on
//! its own through [`Analyzer`].

use std::time::Instant;

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::clinical::{self, ClinicalAssessment, Significance};
use crate::analysis::measurement::{self, Calibration, WidthMeasurement, WidthMethod};
use crate::analysis::{classifier, pairing, quality};
use crate::annotate;
use crate::config::AnalysisConfig;
use crate::detection::{contours, preprocessing, regions};
use crate::error::AnalysisError;
use crate::models::{
    BoundingBox, Centroid, ClassifiedTooth, Contour, ImageShape, ToothCandidate, ToothPair,
    ToothType,
};

/// Receives intermediate images as the analysis advances.
///
/// Indices start at 0 for the input image and grow by one per stage.
pub trait StageObserver {
    fn on_stage(&mut self, index: usize, name: &str, image: DynamicImage);
}

/// Intermediate image captured by [`StageRecorder`]
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    pub index: usize,
    pub name: String,
    pub image: DynamicImage,
}

impl StageSnapshot {
    /// Numbered file name, e.g. `01_enhanced.png`
    pub fn file_name(&self) -> String {
        format!(
            "{:02}_{}.png",
            self.index,
            self.name.to_lowercase().replace(' ', "_")
        )
    }
}

/// Keeps every stage image in memory
#[derive(Debug, Default)]
pub struct StageRecorder {
    pub stages: Vec<StageSnapshot>,
}

impl StageObserver for StageRecorder {
    fn on_stage(&mut self, index: usize, name: &str, image: DynamicImage) {
        self.stages.push(StageSnapshot {
            index,
            name: name.to_string(),
            image,
        });
    }
}

/// Measurement of one tooth of the selected pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToothReport {
    pub width_mm: f64,
    pub width_pixels: f64,
    pub method: WidthMethod,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub centroid: Centroid,
}

impl ToothReport {
    fn new(tooth: &ClassifiedTooth, width: WidthMeasurement) -> Self {
        Self {
            width_mm: width.width_mm,
            width_pixels: width.width_pixels,
            method: width.method,
            confidence: tooth.confidence,
            bbox: tooth.candidate.bbox,
            centroid: tooth.candidate.centroid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceReport {
    pub value_mm: f64,
    pub percentage: f64,
    pub significance: Significance,
}

/// Outcome of a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub molar: ToothReport,
    pub premolar: ToothReport,
    pub difference: DifferenceReport,
    pub detected_region_count: usize,
    /// Regions labelled primary molar or premolar
    pub classified_tooth_count: usize,
    pub validated_pair_count: usize,
    pub best_pair_confidence: f64,
    pub anatomical_score: f64,
    pub calibration: Calibration,
    pub resolution: ImageShape,
    pub processing_duration_ms: u64,
    pub recommendations: Vec<String>,
    pub quality_warnings: Vec<String>,
}

/// Runs the analysis with one immutable configuration.
///
/// Holds no per-call state, so a single instance can serve concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Grayscale, contrast-enhanced and denoised copy of the input
    pub fn enhance(&self, img: &DynamicImage) -> GrayImage {
        preprocessing::enhance(img, &self.config.preprocessing)
    }

    /// Bridged multi-scale edge mask of an enhanced image
    pub fn edge_map(&self, enhanced: &GrayImage) -> GrayImage {
        contours::edge_map(enhanced, &self.config.detection)
    }

    pub fn extract_candidates(&self, enhanced: &GrayImage) -> Vec<ToothCandidate> {
        regions::extract_candidates(enhanced, &self.config.detection)
    }

    pub fn classify_candidates(
        &self,
        candidates: &[ToothCandidate],
        shape: ImageShape,
    ) -> Vec<ClassifiedTooth> {
        classifier::classify_all(candidates, shape, &self.config.classification)
    }

    pub fn validate_pairs(&self, teeth: &[ClassifiedTooth]) -> Vec<ToothPair> {
        pairing::validate_pairs(teeth, &self.config.pairing)
    }

    pub fn measure_width(&self, contour: &Contour, calibration: Calibration) -> WidthMeasurement {
        measurement::measure_width(contour, calibration)
    }

    pub fn assess(&self, molar_width_mm: f64, premolar_width_mm: f64) -> ClinicalAssessment {
        clinical::assess(molar_width_mm, premolar_width_mm)
    }

    /// Analyse a decoded radiograph. Without an explicit calibration the
    /// profile default for the configured image type is used.
    pub fn analyze(
        &self,
        img: &DynamicImage,
        calibration: Option<Calibration>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.run(img, calibration, None)
    }

    /// Like [`Analyzer::analyze`], reporting every intermediate image to
    /// `observer`
    pub fn analyze_observed(
        &self,
        img: &DynamicImage,
        calibration: Option<Calibration>,
        observer: &mut dyn StageObserver,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.run(img, calibration, Some(observer))
    }

    /// Run the geometry stages on candidates produced elsewhere. Area
    /// percentiles are recomputed over the given set.
    pub fn analyze_candidates(
        &self,
        mut candidates: Vec<ToothCandidate>,
        shape: ImageShape,
        calibration: Option<Calibration>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let calibration = self.resolve_calibration(calibration)?;
        regions::assign_area_percentiles(&mut candidates);
        let (teeth, pairs) = self.pair_candidates(&candidates, shape)?;
        self.finish(&candidates, &teeth, &pairs, shape, calibration, started)
    }

    fn resolve_calibration(
        &self,
        calibration: Option<Calibration>,
    ) -> Result<Calibration, AnalysisError> {
        let calibration = calibration.unwrap_or_else(|| self.config.default_calibration());
        calibration.validate()?;
        Ok(calibration)
    }

    fn run(
        &self,
        img: &DynamicImage,
        calibration: Option<Calibration>,
        mut observer: Option<&mut dyn StageObserver>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let calibration = self.resolve_calibration(calibration)?;
        let shape = ImageShape::new(img.width(), img.height());

        info!(
            "Analyzing {} radiograph ({}, {} mode)",
            self.config.image_type, shape, self.config.quality_mode
        );

        if let Some(obs) = observer.as_deref_mut() {
            obs.on_stage(0, "input", img.clone());
        }

        debug!("Running step: enhance");
        let enhanced = self.enhance(img);
        if let Some(obs) = observer.as_deref_mut() {
            obs.on_stage(1, "enhanced", DynamicImage::ImageLuma8(enhanced.clone()));
        }

        debug!("Running step: edge map");
        let mask = self.edge_map(&enhanced);
        if let Some(obs) = observer.as_deref_mut() {
            obs.on_stage(2, "edges", DynamicImage::ImageLuma8(mask.clone()));
        }

        debug!("Running step: extract regions");
        let candidates = regions::candidates_from_mask(&mask, &self.config.detection);

        let paired = self.pair_candidates(&candidates, shape);

        if let Some(obs) = observer.as_deref_mut() {
            let overlay = match &paired {
                Ok((teeth, pairs)) => {
                    annotate::render_teeth(&enhanced, teeth, pairing::select_best(pairs))
                }
                Err(_) => {
                    let teeth = self.classify_candidates(&candidates, shape);
                    annotate::render_teeth(&enhanced, &teeth, None)
                }
            };
            obs.on_stage(3, "teeth", DynamicImage::ImageRgb8(overlay));
        }

        let (teeth, pairs) = paired?;
        self.finish(&candidates, &teeth, &pairs, shape, calibration, started)
    }

    /// Classification and pairing, with the two early-exit errors
    fn pair_candidates(
        &self,
        candidates: &[ToothCandidate],
        shape: ImageShape,
    ) -> Result<(Vec<ClassifiedTooth>, Vec<ToothPair>), AnalysisError> {
        let detected = candidates.len();
        if detected < 2 {
            return Err(AnalysisError::InsufficientRegions { detected });
        }

        debug!("Running step: classify ({} regions)", detected);
        let teeth = self.classify_candidates(candidates, shape);

        debug!("Running step: pair teeth");
        let pairs = self.validate_pairs(&teeth);
        if pairs.is_empty() {
            return Err(AnalysisError::NoValidPairs {
                detected,
                classified: classified_count(&teeth),
            });
        }

        Ok((teeth, pairs))
    }

    fn finish(
        &self,
        candidates: &[ToothCandidate],
        teeth: &[ClassifiedTooth],
        pairs: &[ToothPair],
        shape: ImageShape,
        calibration: Calibration,
        started: Instant,
    ) -> Result<AnalysisResult, AnalysisError> {
        let best = pairing::select_best(pairs).ok_or_else(|| AnalysisError::NoValidPairs {
            detected: candidates.len(),
            classified: classified_count(teeth),
        })?;

        debug!("Running step: measure widths");
        let molar_width = self.measure_width(&best.molar.candidate.contour, calibration);
        let premolar_width = self.measure_width(&best.premolar.candidate.contour, calibration);

        let assessment = self.assess(molar_width.width_mm, premolar_width.width_mm);
        let pair_distance = best
            .molar
            .candidate
            .centroid
            .distance_to(&best.premolar.candidate.centroid);
        let quality_warnings = quality::review(
            molar_width.width_mm,
            premolar_width.width_mm,
            pair_distance,
            &self.config.quality,
        );

        let processing_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            molar_mm = molar_width.width_mm,
            premolar_mm = premolar_width.width_mm,
            significance = %assessment.significance,
            "Analysis complete in {} ms",
            processing_duration_ms
        );

        Ok(AnalysisResult {
            molar: ToothReport::new(&best.molar, molar_width),
            premolar: ToothReport::new(&best.premolar, premolar_width),
            difference: DifferenceReport {
                value_mm: assessment.difference_mm,
                percentage: assessment.percentage,
                significance: assessment.significance,
            },
            detected_region_count: candidates.len(),
            classified_tooth_count: classified_count(teeth),
            validated_pair_count: pairs.len(),
            best_pair_confidence: best.pair_confidence,
            anatomical_score: best.anatomical_score,
            calibration,
            resolution: shape,
            processing_duration_ms,
            recommendations: assessment.recommendations,
            quality_warnings,
        })
    }
}

fn classified_count(teeth: &[ClassifiedTooth]) -> usize {
    teeth.iter().filter(|t| t.label != ToothType::Other).count()
}
