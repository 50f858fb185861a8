//! Calibrated mesio-distal width of a single tooth region.
//!
//! The width is the extent of the contour across its minor principal axis.
//! Contours too small or too degenerate for a stable covariance fall back to
//! the shorter side of the axis-aligned bounding box.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::models::Contour;

/// Fewer points than this always use the bounding box
pub const MIN_PCA_POINTS: usize = 5;

/// Relative determinant threshold under which the covariance is singular
const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Pixel to millimetre conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub mm_per_pixel: f64,
    /// Radiographic magnification; widths are divided by it
    pub magnification: f64,
}

impl Calibration {
    pub fn new(mm_per_pixel: f64) -> Self {
        Self {
            mm_per_pixel,
            magnification: 1.0,
        }
    }

    pub fn with_magnification(mut self, magnification: f64) -> Self {
        self.magnification = magnification;
        self
    }

    /// Millimetres per image pixel after undoing magnification
    pub fn effective_factor(&self) -> f64 {
        self.mm_per_pixel / self.magnification
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.mm_per_pixel.is_finite() && self.mm_per_pixel > 0.0) {
            return Err(AnalysisError::invalid_config(format!(
                "mm_per_pixel must be positive, got {}",
                self.mm_per_pixel
            )));
        }
        if !(self.magnification.is_finite() && self.magnification > 0.0) {
            return Err(AnalysisError::invalid_config(format!(
                "magnification must be positive, got {}",
                self.magnification
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthMethod {
    PrincipalAxis,
    BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidthMeasurement {
    pub width_mm: f64,
    pub width_pixels: f64,
    pub method: WidthMethod,
}

/// Sample covariance of the contour points, with their mean
fn covariance(contour: &Contour) -> (Vector2<f64>, Matrix2<f64>) {
    let n = contour.len() as f64;
    let mean = contour
        .points
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + Vector2::new(p.x as f64, p.y as f64))
        / n;

    let mut cov = Matrix2::zeros();
    for p in &contour.points {
        let d = Vector2::new(p.x as f64, p.y as f64) - mean;
        cov += d * d.transpose();
    }

    (mean, cov / (n - 1.0))
}

fn is_degenerate(cov: &Matrix2<f64>) -> bool {
    if cov.iter().any(|v| !v.is_finite()) {
        return true;
    }
    let trace = cov.trace();
    cov.determinant() <= DEGENERACY_TOLERANCE * (trace * trace + f64::EPSILON)
}

/// Decide which width strategy a contour supports
pub fn select_method(contour: &Contour) -> WidthMethod {
    if contour.len() < MIN_PCA_POINTS {
        return WidthMethod::BoundingBox;
    }
    let (_, cov) = covariance(contour);
    if is_degenerate(&cov) {
        WidthMethod::BoundingBox
    } else {
        WidthMethod::PrincipalAxis
    }
}

/// Smaller of the two extents along the principal axes
fn principal_axis_width(contour: &Contour) -> f64 {
    let (mean, cov) = covariance(contour);
    let eigen = cov.symmetric_eigen();

    let mut extents = [0.0f64; 2];
    for (axis, extent) in extents.iter_mut().enumerate() {
        let direction = eigen.eigenvectors.column(axis);
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &contour.points {
            let d = Vector2::new(p.x as f64, p.y as f64) - mean;
            let t = d.dot(&direction);
            lo = lo.min(t);
            hi = hi.max(t);
        }
        *extent = hi - lo;
    }

    extents[0].min(extents[1])
}

fn bounding_box_width(contour: &Contour) -> f64 {
    contour.bounding_box().shorter_side() as f64
}

/// Measure one tooth. Never fails: unstable geometry switches strategy.
pub fn measure_width(contour: &Contour, calibration: Calibration) -> WidthMeasurement {
    let method = select_method(contour);
    let width_pixels = match method {
        WidthMethod::PrincipalAxis => principal_axis_width(contour),
        WidthMethod::BoundingBox => bounding_box_width(contour),
    };

    WidthMeasurement {
        width_mm: width_pixels * calibration.effective_factor(),
        width_pixels,
        method,
    }
}
