use image::{GrayImage, imageops};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use imageproc::point::Point;

use crate::config::DetectionConfig;
use crate::models::Contour;

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Union of the Canny edge maps obtained at every smoothing scale
pub fn multi_scale_edges(
    img: &GrayImage,
    sigmas: &[f32],
    low_threshold: f32,
    high_threshold: f32,
) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut combined = GrayImage::new(width, height);

    for &sigma in sigmas {
        let blurred = apply_blur(img, sigma);
        let edges = detect_edges(&blurred, low_threshold, high_threshold);
        for (acc, edge) in combined.pixels_mut().zip(edges.pixels()) {
            acc[0] |= edge[0];
        }
    }

    combined
}

/// Close small gaps between edge fragments, then thicken the result
pub fn bridge_gaps(edges: &GrayImage, closing_radius: u8, dilation_radius: u8) -> GrayImage {
    let closed = close(edges, Norm::LInf, closing_radius);
    dilate(&closed, Norm::LInf, dilation_radius)
}

/// Binary boundary mask used for contour extraction
pub fn edge_map(img: &GrayImage, config: &DetectionConfig) -> GrayImage {
    let edges = multi_scale_edges(img, &config.sigma_values, config.canny_low, config.canny_high);
    bridge_gaps(&edges, config.closing_radius, config.dilation_radius)
}

/// Outer borders of the top-level foreground components of a binary mask.
/// Holes and nested components are ignored.
///
/// The mask is traced inside a one pixel background frame so that regions
/// touching the image border still get an outer border.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            Contour::new(points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn filled_rect(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x >= x0 && x <= x1 && y >= y0 && y <= y1 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = GrayImage::from_pixel(60, 60, Luma([120]));
        let edges = multi_scale_edges(&img, &[1.5, 2.5], 50.0, 150.0);
        assert!(edges.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_step_produces_edges() {
        let img = GrayImage::from_fn(60, 60, |x, _| Luma([if x < 30 { 20 } else { 230 }]));
        let edges = multi_scale_edges(&img, &[1.5], 50.0, 150.0);
        assert!(edges.pixels().any(|p| p[0] > 0));
    }

    #[test]
    fn test_external_contours_skip_holes() {
        // A hollow square ring: one outer border, one hole border
        let mut mask = filled_rect(40, 40, 5, 5, 30, 30);
        for y in 10..=25 {
            for x in 10..=25 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let bbox = contours[0].bounding_box();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (5, 5, 25, 25));
    }

    #[test]
    fn test_separate_blobs_give_separate_contours() {
        let mut mask = filled_rect(60, 30, 2, 2, 12, 12);
        for y in 5..=20 {
            for x in 30..=50 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        assert_eq!(find_external_contours(&mask).len(), 2);
    }

    #[test]
    fn test_bridge_gaps_joins_nearby_fragments() {
        let mut edges = GrayImage::new(30, 10);
        for x in 2..10 {
            edges.put_pixel(x, 5, Luma([255]));
        }
        for x in 12..20 {
            edges.put_pixel(x, 5, Luma([255]));
        }
        let bridged = bridge_gaps(&edges, 2, 0);
        assert_eq!(bridged.get_pixel(11, 5)[0], 255);
        assert_eq!(find_external_contours(&bridged).len(), 1);
    }

    #[test]
    fn test_regions_touching_the_border_are_kept() {
        let left = filled_rect(80, 80, 0, 10, 59, 69);
        let contours = find_external_contours(&left);
        assert_eq!(contours.len(), 1);
        let bbox = contours[0].bounding_box();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (0, 10, 59, 59));

        let corner = filled_rect(40, 40, 20, 20, 39, 39);
        let contours = find_external_contours(&corner);
        assert_eq!(contours.len(), 1);
        let bbox = contours[0].bounding_box();
        assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (20, 20, 19, 19));
    }
}
