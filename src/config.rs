//! Named, immutable parameter profiles for every stage of the analysis.
//!
//! A profile is chosen once per run from an [`ImageType`] and a
//! [`QualityMode`]; components receive the sub-config they need by reference
//! and never mutate it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::measurement::Calibration;
use crate::error::AnalysisError;

/// Source of the radiograph; drives the default pixel size and area floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    #[default]
    Panoramic,
    Intraoral,
    Cbct,
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panoramic" => Ok(ImageType::Panoramic),
            "intraoral" => Ok(ImageType::Intraoral),
            "cbct" => Ok(ImageType::Cbct),
            other => Err(format!(
                "unknown image type '{other}' (expected panoramic, intraoral or cbct)"
            )),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageType::Panoramic => "panoramic",
            ImageType::Intraoral => "intraoral",
            ImageType::Cbct => "cbct",
        })
    }
}

/// Speed/accuracy trade-off of the edge detection and contrast stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    Fast,
    #[default]
    Standard,
    HighQuality,
}

impl FromStr for QualityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fast" => Ok(QualityMode::Fast),
            "standard" => Ok(QualityMode::Standard),
            "high_quality" => Ok(QualityMode::HighQuality),
            other => Err(format!(
                "unknown quality mode '{other}' (expected fast, standard or high-quality)"
            )),
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityMode::Fast => "fast",
            QualityMode::Standard => "standard",
            QualityMode::HighQuality => "high-quality",
        })
    }
}

/// Closed interval `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Open interval test `(min, max)`
    pub fn contains_strict(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub clahe_clip_limit: f32,
    /// Tile grid as (columns, rows)
    pub clahe_tile_grid: (u32, u32),
    pub percentile_low: f32,
    pub percentile_high: f32,
    /// Neighbourhood diameter of the bilateral filter
    pub bilateral_diameter: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,
    pub sharpen_enabled: bool,
    /// Row-major 3x3 kernel
    pub sharpen_kernel: [f32; 9],
    pub sharpen_weight: f32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 3.5,
            clahe_tile_grid: (8, 8),
            percentile_low: 1.0,
            percentile_high: 99.0,
            bilateral_diameter: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            sharpen_enabled: true,
            sharpen_kernel: [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0],
            sharpen_weight: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Gaussian sigmas of the multi-scale edge pass
    pub sigma_values: Vec<f32>,
    pub canny_low: f32,
    pub canny_high: f32,
    pub closing_radius: u8,
    pub dilation_radius: u8,
    pub min_area: f64,
    pub max_area: f64,
    pub min_compactness: f64,
    pub min_solidity: f64,
    pub aspect_ratio_min: f64,
    pub aspect_ratio_max: f64,
    /// Dental arch window, as fractions of the image height/width
    pub arch_top_ratio: f64,
    pub arch_bottom_ratio: f64,
    pub arch_width_ratio: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sigma_values: vec![1.5, 2.5],
            canny_low: 50.0,
            canny_high: 150.0,
            closing_radius: 3,
            dilation_radius: 2,
            min_area: 150.0,
            max_area: 30000.0,
            min_compactness: 0.05,
            min_solidity: 0.4,
            aspect_ratio_min: 0.3,
            aspect_ratio_max: 3.0,
            arch_top_ratio: 0.25,
            arch_bottom_ratio: 0.75,
            arch_width_ratio: 0.75,
        }
    }
}

/// Additive weights of the classification rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationWeights {
    pub posterior: f64,
    pub posterior_bonus: f64,
    pub middle: f64,
    pub central_bonus: f64,
    pub molar_vertical: f64,
    pub premolar_vertical: f64,
    pub large_molar: f64,
    pub medium_premolar: f64,
    pub medium_molar: f64,
    pub small_premolar: f64,
    pub compact_molar: f64,
    pub compact_premolar: f64,
    pub molar_aspect: f64,
    pub premolar_aspect: f64,
}

impl Default for ClassificationWeights {
    fn default() -> Self {
        Self {
            posterior: 0.5,
            posterior_bonus: 0.2,
            middle: 0.4,
            central_bonus: 0.2,
            molar_vertical: 0.2,
            premolar_vertical: 0.2,
            large_molar: 0.4,
            medium_premolar: 0.3,
            medium_molar: 0.1,
            small_premolar: 0.2,
            compact_molar: 0.15,
            compact_premolar: 0.1,
            molar_aspect: 0.15,
            premolar_aspect: 0.15,
        }
    }
}

/// Detection confidence composite, independent of the label scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    pub base: f64,
    pub optimal_area: Band,
    pub optimal_area_bonus: f64,
    pub acceptable_area: Band,
    pub acceptable_area_bonus: f64,
    pub strong_compactness: f64,
    pub strong_compactness_bonus: f64,
    pub weak_compactness: f64,
    pub weak_compactness_bonus: f64,
    pub core_vertical: Band,
    pub core_vertical_bonus: f64,
    pub outer_vertical: Band,
    pub outer_vertical_bonus: f64,
    pub aspect: Band,
    pub aspect_bonus: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            base: 0.3,
            optimal_area: Band::new(300.0, 20000.0),
            optimal_area_bonus: 0.3,
            acceptable_area: Band::new(150.0, 30000.0),
            acceptable_area_bonus: 0.2,
            strong_compactness: 0.15,
            strong_compactness_bonus: 0.2,
            weak_compactness: 0.1,
            weak_compactness_bonus: 0.1,
            core_vertical: Band::new(0.25, 0.8),
            core_vertical_bonus: 0.2,
            outer_vertical: Band::new(0.2, 0.85),
            outer_vertical_bonus: 0.1,
            aspect: Band::new(0.5, 2.0),
            aspect_bonus: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Horizontal band (fraction of width) where primary molars sit
    pub posterior_region: Band,
    /// Extra molar credit past this horizontal fraction
    pub posterior_bonus_from: f64,
    /// Horizontal band where premolars sit
    pub middle_region: Band,
    /// Narrower central sub-band of `middle_region`
    pub central_region: Band,
    pub molar_vertical: Band,
    pub premolar_vertical: Band,
    /// Area percentile above which a tooth counts as large
    pub large_percentile: f64,
    /// Area percentile above which a tooth counts as medium
    pub medium_percentile: f64,
    pub compactness_threshold: f64,
    pub molar_aspect: Band,
    pub premolar_aspect: Band,
    /// Best label score below this turns the tooth into `Other`
    pub confidence_floor: f64,
    pub weights: ClassificationWeights,
    pub confidence: ConfidenceConfig,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            posterior_region: Band::new(0.55, 0.9),
            posterior_bonus_from: 0.7,
            middle_region: Band::new(0.35, 0.75),
            central_region: Band::new(0.45, 0.65),
            molar_vertical: Band::new(0.25, 0.7),
            premolar_vertical: Band::new(0.35, 0.8),
            large_percentile: 0.65,
            medium_percentile: 0.35,
            compactness_threshold: 0.15,
            molar_aspect: Band::new(0.6, 1.6),
            premolar_aspect: Band::new(0.8, 2.2),
            confidence_floor: 0.4,
            weights: ClassificationWeights::default(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

/// Anatomical constraints used when matching molars to premolars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Maximum centroid distance in pixels
    pub proximity_px: f64,
    /// Maximum horizontal centroid offset in pixels
    pub horizontal_overlap_px: f64,
    pub enforce_size_relationship: bool,
    /// Molar must be this fraction larger than the premolar
    pub size_difference_threshold: f64,
    /// Premolar centroid may sit up to this many image rows above the molar's
    pub below_window_px: f64,
    /// Tolerance for teeth at the same vertical level
    pub level_tolerance_px: f64,
    pub acceptance_floor: f64,
    pub proximity_weight: f64,
    pub alignment_weight: f64,
    pub below_weight: f64,
    pub level_weight: f64,
    pub size_weight: f64,
    pub posterior_weight: f64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            proximity_px: 100.0,
            horizontal_overlap_px: 60.0,
            enforce_size_relationship: true,
            size_difference_threshold: 0.1,
            below_window_px: 80.0,
            level_tolerance_px: 20.0,
            acceptance_floor: 0.6,
            proximity_weight: 0.3,
            alignment_weight: 0.2,
            below_weight: 0.3,
            level_weight: 0.2,
            size_weight: 0.2,
            posterior_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelSizeEstimates {
    pub panoramic: f64,
    pub intraoral: f64,
    pub cbct: f64,
}

impl Default for PixelSizeEstimates {
    fn default() -> Self {
        Self {
            panoramic: 0.1,
            intraoral: 0.05,
            cbct: 0.2,
        }
    }
}

impl PixelSizeEstimates {
    pub fn for_image_type(&self, image_type: ImageType) -> f64 {
        match image_type {
            ImageType::Panoramic => self.panoramic,
            ImageType::Intraoral => self.intraoral,
            ImageType::Cbct => self.cbct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// mm/pixel used when the caller supplies no calibration
    pub default_mm_per_pixel: f64,
    /// Radiographic magnification divided out of every width
    pub magnification: f64,
    pub pixel_size_estimates: PixelSizeEstimates,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            default_mm_per_pixel: 0.1,
            magnification: 1.0,
            pixel_size_estimates: PixelSizeEstimates::default(),
        }
    }
}

/// Plausibility limits for a finished measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    pub min_width_mm: f64,
    pub max_width_mm: f64,
    pub max_width_difference_mm: f64,
    pub min_pair_distance_px: f64,
    pub max_pair_distance_px: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_width_mm: 2.0,
            max_width_mm: 15.0,
            max_width_difference_mm: 8.0,
            min_pair_distance_px: 15.0,
            max_pair_distance_px: 250.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Abort the batch once this many images in a row have failed
    pub max_consecutive_failures: usize,
    /// Per-image deadline in seconds
    pub max_processing_time_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 10,
            max_processing_time_secs: 300.0,
        }
    }
}

/// Complete parameter set for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub image_type: ImageType,
    pub quality_mode: QualityMode,
    pub preprocessing: PreprocessingConfig,
    pub detection: DetectionConfig,
    pub classification: ClassificationConfig,
    pub pairing: PairingConfig,
    pub measurement: MeasurementConfig,
    pub quality: QualityConfig,
    pub batch: BatchConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::profile(ImageType::Panoramic, QualityMode::Standard)
    }
}

impl AnalysisConfig {
    /// Build the named profile for an image source and quality mode
    pub fn profile(image_type: ImageType, quality_mode: QualityMode) -> Self {
        let mut preprocessing = PreprocessingConfig::default();
        let mut detection = DetectionConfig::default();
        let mut measurement = MeasurementConfig::default();

        measurement.default_mm_per_pixel = measurement
            .pixel_size_estimates
            .for_image_type(image_type);
        detection.min_area = match image_type {
            ImageType::Panoramic => 150.0,
            ImageType::Intraoral => 300.0,
            ImageType::Cbct => 100.0,
        };

        match quality_mode {
            QualityMode::Fast => {
                detection.sigma_values = vec![2.0, 3.0];
                preprocessing.clahe_clip_limit = 2.5;
            }
            QualityMode::Standard => {}
            QualityMode::HighQuality => {
                detection.sigma_values = vec![1.0, 1.5, 2.0, 2.5, 3.0];
                preprocessing.clahe_clip_limit = 4.0;
            }
        }

        Self {
            image_type,
            quality_mode,
            preprocessing,
            detection,
            classification: ClassificationConfig::default(),
            pairing: PairingConfig::default(),
            measurement,
            quality: QualityConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    /// Calibration used when the caller does not provide one
    pub fn default_calibration(&self) -> Calibration {
        Calibration {
            mm_per_pixel: self.measurement.default_mm_per_pixel,
            magnification: self.measurement.magnification,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| AnalysisError::invalid_config(format!("malformed JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::invalid_config(format!("cannot serialize: {e}")))
    }

    /// Reject parameter combinations that would make a stage panic or
    /// silently discard every region
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let d = &self.detection;
        if d.sigma_values.is_empty() {
            return Err(AnalysisError::invalid_config("sigma_values must not be empty"));
        }
        if d.sigma_values.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(AnalysisError::invalid_config("every sigma must be positive"));
        }
        if d.canny_low > d.canny_high {
            return Err(AnalysisError::invalid_config("canny_low exceeds canny_high"));
        }
        if d.min_area > d.max_area {
            return Err(AnalysisError::invalid_config("min_area exceeds max_area"));
        }
        if d.aspect_ratio_min > d.aspect_ratio_max {
            return Err(AnalysisError::invalid_config(
                "aspect_ratio_min exceeds aspect_ratio_max",
            ));
        }
        if d.arch_top_ratio > d.arch_bottom_ratio {
            return Err(AnalysisError::invalid_config(
                "arch_top_ratio exceeds arch_bottom_ratio",
            ));
        }

        let p = &self.preprocessing;
        if p.clahe_tile_grid.0 == 0 || p.clahe_tile_grid.1 == 0 {
            return Err(AnalysisError::invalid_config("clahe_tile_grid must be non-zero"));
        }
        if !(0.0..=100.0).contains(&p.percentile_low)
            || !(0.0..=100.0).contains(&p.percentile_high)
            || p.percentile_low > p.percentile_high
        {
            return Err(AnalysisError::invalid_config(
                "percentile bounds must satisfy 0 <= low <= high <= 100",
            ));
        }
        if p.bilateral_sigma_color <= 0.0 || p.bilateral_sigma_space <= 0.0 {
            return Err(AnalysisError::invalid_config("bilateral sigmas must be positive"));
        }

        let b = &self.batch;
        if b.max_consecutive_failures == 0 {
            return Err(AnalysisError::invalid_config(
                "max_consecutive_failures must be at least 1",
            ));
        }
        if !(b.max_processing_time_secs.is_finite() && b.max_processing_time_secs > 0.0) {
            return Err(AnalysisError::invalid_config(
                "max_processing_time_secs must be positive",
            ));
        }

        self.default_calibration().validate()
    }
}
