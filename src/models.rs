use std::fmt;

use image::GrayImage;
use imageproc::geometry::{arc_length, contour_area, convex_hull};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Width and height of the analysed image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: u32,
    pub height: u32,
}

impl ImageShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned bounding box. `width` and `height` are the coordinate
/// extents (`max - min`) of the points it encloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Sub-pixel position, used for contour centroids
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn distance_to(&self, other: &Centroid) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Closed boundary of an image region, stored as an ordered list of pixel
/// positions. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area of the boundary polygon, independent of orientation
    pub fn area(&self) -> f64 {
        contour_area(self.points.as_slice())
    }

    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        arc_length(&self.points, true)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let Some(first) = self.points.first() else {
            return BoundingBox::default();
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        BoundingBox {
            x: min_x,
            y: min_y,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        }
    }

    /// Polygon centroid from first-order moments. Degenerate (zero-area)
    /// boundaries fall back to the mean of their points.
    pub fn centroid(&self) -> Centroid {
        if self.points.is_empty() {
            return Centroid::default();
        }

        let n = self.points.len();
        let mut signed_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let cross = p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
            signed_area += cross;
            cx += (p.x + q.x) as f64 * cross;
            cy += (p.y + q.y) as f64 * cross;
        }
        signed_area *= 0.5;

        if signed_area.abs() < f64::EPSILON {
            let sx: f64 = self.points.iter().map(|p| p.x as f64).sum();
            let sy: f64 = self.points.iter().map(|p| p.y as f64).sum();
            return Centroid {
                x: sx / n as f64,
                y: sy / n as f64,
            };
        }

        Centroid {
            x: cx / (6.0 * signed_area),
            y: cy / (6.0 * signed_area),
        }
    }

    pub fn convex_hull_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        contour_area(convex_hull(self.points.as_slice()).as_slice())
    }

    /// 4π·area / perimeter², 1.0 for a perfect circle
    pub fn compactness(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)
    }

    /// Region area over convex hull area; 1.0 when the hull is empty
    pub fn solidity(&self) -> f64 {
        let hull_area = self.convex_hull_area();
        if hull_area <= 0.0 {
            return 1.0;
        }
        self.area() / hull_area
    }
}

/// Anatomical label assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothType {
    PrimaryMolar,
    Premolar,
    Other,
}

impl fmt::Display for ToothType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToothType::PrimaryMolar => "primary molar",
            ToothType::Premolar => "premolar",
            ToothType::Other => "other",
        };
        f.write_str(name)
    }
}

/// A tooth-shaped region that survived geometric filtering
#[derive(Debug, Clone)]
pub struct ToothCandidate {
    pub contour: Contour,
    pub centroid: Centroid,
    pub bbox: BoundingBox,
    pub area: f64,
    pub perimeter: f64,
    pub aspect_ratio: f64,
    pub compactness: f64,
    pub solidity: f64,
    /// Rank of `area` among all candidates of the same image, in (0, 1]
    pub area_percentile: f64,
}

impl ToothCandidate {
    pub fn from_contour(contour: Contour) -> Self {
        let bbox = contour.bounding_box();
        Self {
            centroid: contour.centroid(),
            area: contour.area(),
            perimeter: contour.perimeter(),
            aspect_ratio: bbox.aspect_ratio(),
            compactness: contour.compactness(),
            solidity: contour.solidity(),
            area_percentile: 0.5,
            bbox,
            contour,
        }
    }
}

/// Per-label scores produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelScores {
    pub primary_molar: f64,
    pub premolar: f64,
    pub other: f64,
}

#[derive(Debug, Clone)]
pub struct ClassifiedTooth {
    pub candidate: ToothCandidate,
    pub label: ToothType,
    pub confidence: f64,
    pub scores: LabelScores,
}

/// A primary molar matched with the premolar that succeeds it
#[derive(Debug, Clone)]
pub struct ToothPair {
    pub molar: ClassifiedTooth,
    pub premolar: ClassifiedTooth,
    pub anatomical_score: f64,
    pub pair_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn test_rectangle_geometry() {
        let c = rect(10, 20, 50, 80);
        assert_relative_eq!(c.area(), 2400.0);
        assert_relative_eq!(c.perimeter(), 200.0);
        assert_eq!(
            c.bounding_box(),
            BoundingBox { x: 10, y: 20, width: 40, height: 60 }
        );
        let centroid = c.centroid();
        assert_relative_eq!(centroid.x, 30.0);
        assert_relative_eq!(centroid.y, 50.0);
        assert_relative_eq!(c.solidity(), 1.0);
    }

    #[test]
    fn test_area_ignores_winding_direction() {
        let mut reversed = rect(10, 20, 50, 80);
        reversed.points.reverse();
        assert_relative_eq!(reversed.area(), 2400.0);
        assert_relative_eq!(reversed.convex_hull_area(), 2400.0);
    }

    #[test]
    fn test_compactness_of_square() {
        let c = rect(0, 0, 10, 10);
        assert_relative_eq!(c.compactness(), std::f64::consts::PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_concave_region_has_lower_solidity() {
        // L-shape: a 20x20 square with the top-right 10x10 quadrant removed
        let c = Contour::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(20, 10),
            Point::new(20, 20),
            Point::new(0, 20),
        ]);
        assert_relative_eq!(c.area(), 300.0);
        assert!(c.solidity() < 1.0);
        assert!(c.solidity() > 0.8);
    }

    #[test]
    fn test_degenerate_contour() {
        let c = Contour::new(vec![Point::new(3, 4), Point::new(7, 4)]);
        assert_eq!(c.area(), 0.0);
        assert_eq!(c.convex_hull_area(), 0.0);
        let centroid = c.centroid();
        assert_relative_eq!(centroid.x, 5.0);
        assert_relative_eq!(centroid.y, 4.0);
        assert_eq!(Contour::new(vec![]).bounding_box(), BoundingBox::default());
    }

    #[test]
    fn test_aspect_ratio_zero_height() {
        let bbox = BoundingBox { x: 0, y: 0, width: 5, height: 0 };
        assert_eq!(bbox.aspect_ratio(), 0.0);
        assert_eq!(bbox.shorter_side(), 0);
    }
}
