//! Diagnostic overlays of the detected teeth.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::models::{ClassifiedTooth, ToothPair, ToothType};

const MOLAR_COLOR: Rgb<u8> = Rgb([220, 40, 40]);
const PREMOLAR_COLOR: Rgb<u8> = Rgb([40, 200, 60]);
const OTHER_COLOR: Rgb<u8> = Rgb([150, 150, 150]);
const PAIR_COLOR: Rgb<u8> = Rgb([250, 210, 40]);

fn label_color(label: ToothType) -> Rgb<u8> {
    match label {
        ToothType::PrimaryMolar => MOLAR_COLOR,
        ToothType::Premolar => PREMOLAR_COLOR,
        ToothType::Other => OTHER_COLOR,
    }
}

/// Draw every classified region's bounding box and centroid, and link the
/// centroids of the selected pair
pub fn render_teeth(
    base: &GrayImage,
    teeth: &[ClassifiedTooth],
    best: Option<&ToothPair>,
) -> RgbImage {
    let mut canvas = RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let v = base.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for tooth in teeth {
        let color = label_color(tooth.label);
        let bbox = tooth.candidate.bbox;
        let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.width.max(1), bbox.height.max(1));
        draw_hollow_rect_mut(&mut canvas, rect, color);

        let c = tooth.candidate.centroid;
        draw_cross_mut(&mut canvas, color, c.x.round() as i32, c.y.round() as i32);
    }

    if let Some(pair) = best {
        let m = pair.molar.candidate.centroid;
        let p = pair.premolar.candidate.centroid;
        draw_line_segment_mut(
            &mut canvas,
            (m.x as f32, m.y as f32),
            (p.x as f32, p.y as f32),
            PAIR_COLOR,
        );
    }

    canvas
}
