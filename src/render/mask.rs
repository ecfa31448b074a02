use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::collections::VecDeque;

use super::rect::PixelRect;

const DARK_LUMA: u8 = 80;
const MIN_MASK_COVERAGE: f32 = 0.15;
const RESIDUAL_TOLERANCE: f32 = 0.65;
const EDGE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// Parameters of one paint-over pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanPass {
    pub expand_px: u32,
    pub feather_sigma: f32,
    pub force_rect: bool,
}

impl CleanPass {
    pub const FIRST: Self = Self {
        expand_px: 1,
        feather_sigma: 0.6,
        force_rect: false,
    };
    pub const RETRY: Self = Self {
        expand_px: 3,
        feather_sigma: 1.2,
        force_rect: true,
    };
}

/// Grayscale copy of `area`, transparent pixels read as white.
pub fn crop_luma(image: &RgbaImage, area: PixelRect) -> GrayImage {
    let mut luma = GrayImage::new(area.width(), area.height());
    for (x, y, out) in luma.enumerate_pixels_mut() {
        let [r, g, b, a] = image.get_pixel(area.x1 + x, area.y1 + y).0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        *out = Luma([(0.299 * r + 0.587 * g + 0.114 * b).round() as u8]);
    }
    luma
}

/// Pixels close to the crop's dominant tone, taken as the balloon interior,
/// plus everything they enclose (the lettering). Returns `None` when that
/// tone covers too little of the crop to be a balloon, in which case the
/// caller fills the plain rectangle.
pub fn build_balloon_mask(image: &RgbaImage, area: PixelRect, tolerance: u8) -> Option<GrayImage> {
    if area.is_empty() {
        return None;
    }
    let gray = crop_luma(image, area);
    let mut histogram = [0u32; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let mut dominant = 0usize;
    for (value, count) in histogram.iter().enumerate() {
        if *count > histogram[dominant] {
            dominant = value;
        }
    }
    let band = (tolerance as i32).min(255 - dominant as i32).max(6);

    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (out, pixel) in mask.pixels_mut().zip(gray.pixels()) {
        let inside = (pixel[0] as i32 - dominant as i32).abs() <= band;
        *out = Luma([if inside { 255 } else { 0 }]);
    }
    fill_enclosed(&mut mask);
    let mask = rank_filter(&mask, 3, u8::min);

    let covered = mask.pixels().filter(|pixel| pixel[0] >= 128).count();
    let total = (mask.width() as usize * mask.height() as usize).max(1);
    if (covered as f32 / total as f32) < MIN_MASK_COVERAGE {
        return None;
    }
    Some(mask)
}

/// Paints `fill` over `area`, through the grown and feathered mask when one
/// is given and the pass allows it, otherwise over the whole rectangle.
pub fn clean_region(
    image: &mut RgbaImage,
    area: PixelRect,
    mask: Option<&GrayImage>,
    fill: Rgba<u8>,
    pass: CleanPass,
) {
    if area.is_empty() {
        return;
    }
    let effective = mask.filter(|_| !pass.force_rect).map(|mask| {
        let mut grown = if pass.expand_px > 0 {
            let size = (pass.expand_px * 2 + 1).max(3);
            rank_filter(mask, size, u8::max)
        } else {
            mask.clone()
        };
        if pass.feather_sigma > 0.0 {
            grown = image::imageops::blur(&grown, pass.feather_sigma);
        }
        grown
    });

    for y in 0..area.height() {
        for x in 0..area.width() {
            let coverage = match &effective {
                Some(mask) => mask.get_pixel(x, y)[0] as f32 / 255.0,
                None => 1.0,
            };
            if coverage <= 0.0 {
                continue;
            }
            let pixel = image.get_pixel_mut(area.x1 + x, area.y1 + y);
            *pixel = blend(*pixel, fill, coverage);
        }
    }
}

fn blend(base: Rgba<u8>, fill: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let alpha = coverage * fill[3] as f32 / 255.0;
    let mix =
        |under: u8, over: u8| (over as f32 * alpha + under as f32 * (1.0 - alpha)).round() as u8;
    let out_alpha = (255.0 * alpha + base[3] as f32 * (1.0 - alpha)).round() as u8;
    Rgba([
        mix(base[0], fill[0]),
        mix(base[1], fill[1]),
        mix(base[2], fill[2]),
        out_alpha,
    ])
}

/// Sets every unmasked pixel that cannot reach the crop border through other
/// unmasked pixels (4-connected).
fn fill_enclosed(mask: &mut GrayImage) {
    let (width, height) = mask.dimensions();
    let mut outside = vec![false; width as usize * height as usize];
    let mut queue = VecDeque::new();

    for y in 0..height {
        for x in 0..width {
            let border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
            if border && mask.get_pixel(x, y)[0] == 0 {
                outside[(y * width + x) as usize] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx >= width || ny >= height {
                continue;
            }
            let idx = (ny * width + nx) as usize;
            if !outside[idx] && mask.get_pixel(nx, ny)[0] == 0 {
                outside[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    for (idx, pixel) in mask.pixels_mut().enumerate() {
        if !outside[idx] {
            *pixel = Luma([255]);
        }
    }
}

/// Square min/max filter of odd `size`, clipped at the borders.
fn rank_filter(image: &GrayImage, size: u32, pick: fn(u8, u8) -> u8) -> GrayImage {
    let radius = (size / 2) as i64;
    let (width, height) = image.dimensions();
    let mut output = GrayImage::new(width, height);
    for (x, y, out) in output.enumerate_pixels_mut() {
        let mut acc: Option<u8> = None;
        for dy in -radius..=radius {
            let ny = y as i64 + dy;
            if ny < 0 || ny >= height as i64 {
                continue;
            }
            for dx in -radius..=radius {
                let nx = x as i64 + dx;
                if nx < 0 || nx >= width as i64 {
                    continue;
                }
                let value = image.get_pixel(nx as u32, ny as u32)[0];
                acc = Some(acc.map_or(value, |current| pick(current, value)));
            }
        }
        *out = Luma([acc.unwrap_or(0)]);
    }
    output
}

pub fn dark_ratio(gray: &GrayImage) -> f32 {
    let total = (gray.width() as usize * gray.height() as usize).max(1);
    let dark = gray.pixels().filter(|pixel| pixel[0] < DARK_LUMA).count();
    dark as f32 / total as f32
}

/// Mean response of a 3x3 Laplacian, in luma units.
pub fn edge_density(gray: &GrayImage) -> f32 {
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }
    let edges: GrayImage = image::imageops::filter3x3(gray, &EDGE_KERNEL);
    let total = (edges.width() as usize * edges.height() as usize).max(1);
    let sum: u64 = edges.pixels().map(|pixel| pixel[0] as u64).sum();
    sum as f32 / total as f32
}

/// Whether the cleaned crop still shows lettering from the source.
pub fn has_residual_text(before: &GrayImage, after: &GrayImage) -> bool {
    let after_dark = dark_ratio(after);
    if after_dark < 0.005 {
        return false;
    }
    let before_dark = dark_ratio(before);
    let before_edges = edge_density(before);
    let after_edges = edge_density(after);

    let dark_ok = after_dark < before_dark * RESIDUAL_TOLERANCE && after_dark < 0.12;
    let edges_ok = after_edges < before_edges * RESIDUAL_TOLERANCE || after_edges < 1.5;
    !(dark_ok && edges_ok)
}
