use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::{bilateral_filter, filter3x3};

use crate::config::PreprocessingConfig;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Run the full enhancement chain: local equalization, percentile stretch,
/// bilateral smoothing and optional sharpening
pub fn enhance(img: &DynamicImage, config: &PreprocessingConfig) -> GrayImage {
    let gray = to_grayscale(img);
    let equalized = equalize_adaptive(&gray, config.clahe_clip_limit, config.clahe_tile_grid);
    let stretched = stretch_percentiles(&equalized, config.percentile_low, config.percentile_high);
    let filtered = denoise(
        &stretched,
        config.bilateral_diameter,
        config.bilateral_sigma_color,
        config.bilateral_sigma_space,
    );

    if config.sharpen_enabled {
        sharpen(&filtered, &config.sharpen_kernel, config.sharpen_weight)
    } else {
        filtered
    }
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles.0` x `tiles.1` grid; each tile gets a
/// lookup table built from its clipped histogram, and every pixel blends the
/// tables of the four nearest tile centres.
pub fn equalize_adaptive(img: &GrayImage, clip_limit: f32, tiles: (u32, u32)) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tiles_x = tiles.0.clamp(1, width) as usize;
    let tiles_y = tiles.1.clamp(1, height) as usize;

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        let y0 = ty as u32 * height / tiles_y as u32;
        let y1 = (ty as u32 + 1) * height / tiles_y as u32;
        for tx in 0..tiles_x {
            let x0 = tx as u32 * width / tiles_x as u32;
            let x1 = (tx as u32 + 1) * width / tiles_x as u32;

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let count = (x1 - x0) * (y1 - y0);
            luts[ty * tiles_x + tx] = clipped_lut(&mut hist, count, clip_limit);
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let (ty0, ty1, ay) = tile_neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, ax) = tile_neighbours(x, tile_w, tiles_x);
            let v = img.get_pixel(x, y)[0] as usize;

            let top = (1.0 - ax) * luts[ty0 * tiles_x + tx0][v] as f32
                + ax * luts[ty0 * tiles_x + tx1][v] as f32;
            let bottom = (1.0 - ax) * luts[ty1 * tiles_x + tx0][v] as f32
                + ax * luts[ty1 * tiles_x + tx1][v] as f32;
            let value = (1.0 - ay) * top + ay * bottom;

            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Clip a tile histogram, spread the excess over all bins and turn the
/// result into an equalization lookup table
fn clipped_lut(hist: &mut [u32; 256], count: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if count == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * count as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let spread = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in hist.iter_mut() {
        *bin += spread;
    }
    // The remainder goes to evenly strided bins across the whole range
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = 255.0 / count as f32;
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Indices of the two tile centres around `pos` and the blend weight of the
/// second one
fn tile_neighbours(pos: u32, tile_size: f32, tiles: usize) -> (usize, usize, f32) {
    let g = (pos as f32 + 0.5) / tile_size - 0.5;
    let first = (g.floor().max(0.0) as usize).min(tiles - 1);
    let second = (first + 1).min(tiles - 1);
    let weight = (g - first as f32).clamp(0.0, 1.0);
    (first, second, weight)
}

/// Intensity at percentile `p` (0..=100), interpolating linearly between the
/// two nearest order statistics
pub fn percentile(img: &GrayImage, p: f32) -> f32 {
    let n = img.as_raw().len();
    if n == 0 {
        return 0.0;
    }

    let mut hist = [0usize; 256];
    for &v in img.as_raw() {
        hist[v as usize] += 1;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f32;

    let lo = nth_value(&hist, lower) as f32;
    let hi = nth_value(&hist, upper) as f32;
    lo + (hi - lo) * frac
}

/// Value of the k-th smallest pixel (0-based) given a histogram
fn nth_value(hist: &[usize; 256], k: usize) -> u8 {
    let mut seen = 0usize;
    for (value, &count) in hist.iter().enumerate() {
        seen += count;
        if seen > k {
            return value as u8;
        }
    }
    255
}

/// Stretch the `[low, high]` percentile range onto the full 0..=255 range.
/// An empty percentile range leaves the image unchanged.
pub fn stretch_percentiles(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    let p_low = percentile(img, low);
    let p_high = percentile(img, high);
    let range = p_high - p_low;

    if range <= f32::EPSILON {
        return img.clone();
    }

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        let stretched = (pixel[0] as f32 - p_low) * 255.0 / range;
        pixel[0] = stretched.clamp(0.0, 255.0) as u8;
    }
    out
}

/// Edge-preserving bilateral smoothing over a `diameter` wide window
pub fn denoise(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    if img.width() == 0 || img.height() == 0 || diameter < 2 {
        return img.clone();
    }
    bilateral_filter(img, diameter, sigma_color, sigma_space)
}

/// Convolve with a 3x3 sharpening kernel and blend the result back:
/// `(1 - weight) * img + weight * sharpened`
pub fn sharpen(img: &GrayImage, kernel: &[f32; 9], weight: f32) -> GrayImage {
    let sharpened: Vec<f32> = filter3x3(img, kernel).into_raw();

    let mut out = img.clone();
    for (pixel, s) in out.pixels_mut().zip(sharpened) {
        let original = pixel[0] as f32;
        let blended = (1.0 - weight) * original + weight * s.clamp(0.0, 255.0);
        pixel[0] = blended.round().clamp(0.0, 255.0) as u8;
    }
    out
}
