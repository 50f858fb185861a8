//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors an analysis call can end with. None of them carry pixel buffers or
/// contour coordinates.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The input could not be decoded into a pixel buffer.
    #[error("could not load image: {reason}")]
    ImageLoad { reason: String },

    /// Fewer than two tooth-shaped regions survived filtering.
    #[error("insufficient teeth detected: {detected} region(s) found, at least 2 required")]
    InsufficientRegions { detected: usize },

    /// Regions were found but no molar/premolar pair cleared the anatomical floor.
    #[error(
        "no valid tooth pairs detected: {classified} classified teeth among {detected} regions"
    )]
    NoValidPairs { detected: usize, classified: usize },

    /// A configuration or calibration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    #[must_use]
    pub fn image_load(reason: impl Into<String>) -> Self {
        Self::ImageLoad {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig(details.into())
    }

    /// Actionable advice for the person who submitted the image
    pub fn suggestions(&self) -> Vec<String> {
        let lines: &[&str] = match self {
            AnalysisError::ImageLoad { .. } => &[
                "Check that the file exists and is a supported image format",
                "Re-export the radiograph as PNG or JPEG",
            ],
            AnalysisError::InsufficientRegions { .. } => &[
                "Ensure image shows clear dental structures",
                "Check image quality and contrast",
                "Verify panoramic radiograph includes posterior teeth",
            ],
            AnalysisError::NoValidPairs { .. } => &[
                "Image may not show clear primary molar and premolar pairs",
                "Try adjusting image contrast or brightness",
                "Ensure the radiograph includes the posterior dental region",
            ],
            AnalysisError::InvalidConfig(_) => &[
                "Review the configuration values against the documented ranges",
                "Start from a built-in profile and change one parameter at a time",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}
