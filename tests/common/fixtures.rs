use image::{DynamicImage, GrayImage, Luma};
use imageproc::point::Point;
use leeway::{Contour, ToothCandidate};
use tempfile::NamedTempFile;

pub const BACKGROUND: u8 = 30;
pub const TOOTH: u8 = 230;

/// Paints a filled rectangle centred on (cx, cy)
fn paint_block(img: &mut GrayImage, cx: u32, cy: u32, width: u32, height: u32, value: u8) {
    for y in cy - height / 2..cy + height / 2 {
        for x in cx - width / 2..cx + width / 2 {
            img.put_pixel(x, y, Luma([value]));
        }
    }
}

/// 400x300 radiograph with two bright, well separated blobs: a larger one
/// in the posterior band and a smaller one just mesial and slightly higher.
pub fn two_tooth_radiograph() -> DynamicImage {
    let mut img = GrayImage::from_pixel(400, 300, Luma([BACKGROUND]));
    paint_block(&mut img, 240, 135, 30, 36, TOOTH);
    paint_block(&mut img, 208, 120, 16, 26, TOOTH);
    DynamicImage::ImageLuma8(img)
}

/// Uniform image without any edge
pub fn blank_radiograph(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([128])))
}

/// Every integer point on the boundary of a w x h rectangle centred on (cx, cy)
pub fn rectangle_contour(cx: i32, cy: i32, w: i32, h: i32) -> Contour {
    let (x0, y0) = (cx - w / 2, cy - h / 2);
    let mut points = Vec::new();
    for x in x0..x0 + w {
        points.push(Point::new(x, y0));
    }
    for y in y0..y0 + h {
        points.push(Point::new(x0 + w, y));
    }
    for x in (x0 + 1..=x0 + w).rev() {
        points.push(Point::new(x, y0 + h));
    }
    for y in (y0 + 1..=y0 + h).rev() {
        points.push(Point::new(x0, y));
    }
    Contour::new(points)
}

pub fn rectangle_candidate(cx: i32, cy: i32, w: i32, h: i32) -> ToothCandidate {
    ToothCandidate::from_contour(rectangle_contour(cx, cy, w, h))
}

/// Writes an image to a temporary PNG file.
/// The file will be automatically cleaned up when dropped.
pub fn save_temp_png(img: &DynamicImage) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}
