use std::fmt;

use image::GrayImage;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::detection::contours;
use crate::models::{ImageShape, ToothCandidate};

/// Rectangle of the image where the dental arch is expected, in pixels.
/// Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchWindow {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl ArchWindow {
    pub fn new(shape: ImageShape, config: &DetectionConfig) -> Self {
        let width = shape.width as f64;
        let height = shape.height as f64;
        Self {
            left: (width * (1.0 - config.arch_width_ratio) / 2.0) as i32,
            right: (width * (1.0 + config.arch_width_ratio) / 2.0) as i32,
            top: (height * config.arch_top_ratio) as i32,
            bottom: (height * config.arch_bottom_ratio) as i32,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Why a contour was not kept as a tooth candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    ZeroPerimeter,
    Area,
    Compactness,
    Solidity,
    AspectRatio,
    OutsideArch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rejection::ZeroPerimeter => "zero perimeter",
            Rejection::Area => "area out of range",
            Rejection::Compactness => "too elongated",
            Rejection::Solidity => "too concave",
            Rejection::AspectRatio => "aspect ratio out of range",
            Rejection::OutsideArch => "outside dental arch",
        })
    }
}

/// Apply the geometric tooth filters to one candidate
pub fn screen(
    candidate: &ToothCandidate,
    window: &ArchWindow,
    config: &DetectionConfig,
) -> Result<(), Rejection> {
    if candidate.perimeter <= 0.0 {
        return Err(Rejection::ZeroPerimeter);
    }
    if candidate.area < config.min_area || candidate.area > config.max_area {
        return Err(Rejection::Area);
    }
    if candidate.compactness < config.min_compactness {
        return Err(Rejection::Compactness);
    }
    if candidate.solidity < config.min_solidity {
        return Err(Rejection::Solidity);
    }
    if candidate.bbox.height == 0
        || candidate.aspect_ratio < config.aspect_ratio_min
        || candidate.aspect_ratio > config.aspect_ratio_max
    {
        return Err(Rejection::AspectRatio);
    }
    let (cx, cy) = candidate.bbox.center();
    if !window.contains(cx, cy) {
        return Err(Rejection::OutsideArch);
    }
    Ok(())
}

/// Filter candidates down to tooth-like regions inside the dental arch
pub fn filter_tooth_regions(
    candidates: Vec<ToothCandidate>,
    shape: ImageShape,
    config: &DetectionConfig,
) -> Vec<ToothCandidate> {
    let window = ArchWindow::new(shape, config);
    let total = candidates.len();

    let kept: Vec<ToothCandidate> = candidates
        .into_iter()
        .filter(|c| match screen(c, &window, config) {
            Ok(()) => true,
            Err(reason) => {
                debug!(area = c.area, bbox = ?c.bbox, %reason, "rejected region");
                false
            }
        })
        .collect();

    debug!("Kept {} tooth-like regions (from {} contours)", kept.len(), total);
    kept
}

/// Rank each candidate's area among all candidates: the 1-based position of
/// the first equal area in ascending order, divided by the count. A lone
/// candidate gets 0.5.
pub fn assign_area_percentiles(candidates: &mut [ToothCandidate]) {
    let n = candidates.len();
    if n <= 1 {
        for c in candidates.iter_mut() {
            c.area_percentile = 0.5;
        }
        return;
    }

    let mut areas: Vec<f64> = candidates.iter().map(|c| c.area).collect();
    areas.sort_by(|a, b| a.total_cmp(b));

    for c in candidates.iter_mut() {
        let index = areas.partition_point(|a| *a < c.area);
        c.area_percentile = (index + 1) as f64 / n as f64;
    }
}

/// Tooth candidates from an already computed boundary mask
pub fn candidates_from_mask(mask: &GrayImage, config: &DetectionConfig) -> Vec<ToothCandidate> {
    let found = contours::find_external_contours(mask);
    debug!("Found {} external contours", found.len());

    let candidates = found.into_iter().map(ToothCandidate::from_contour).collect();
    let mut kept = filter_tooth_regions(candidates, ImageShape::of(mask), config);
    assign_area_percentiles(&mut kept);
    kept
}

/// Run the region extraction stage on an enhanced image
pub fn extract_candidates(processed: &GrayImage, config: &DetectionConfig) -> Vec<ToothCandidate> {
    let mask = contours::edge_map(processed, config);
    candidates_from_mask(&mask, config)
}
