/// Image enhancement: brightness, contrast, saturation and sharpness.
/// Each operation blends the image with a degenerate version of itself:
/// a factor of 1.0 is the identity, 0.0 is the degenerate image.
use image::RgbaImage;

use crate::config::ImageSettings;

/// Apply all enhancement factors in a fixed order
pub fn apply_enhancements(img: &mut RgbaImage, settings: &ImageSettings) {
    if settings.brightness != 1.0 {
        brightness(img, settings.brightness);
    }
    if settings.contrast != 1.0 {
        contrast(img, settings.contrast);
    }
    if settings.saturation != 1.0 {
        saturation(img, settings.saturation);
    }
    if settings.sharpness != 1.0 {
        sharpness(img, settings.sharpness);
    }
}

fn blend(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + (value as f32 - degenerate) * factor)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn luma(px: &[u8]) -> f32 {
    (px[0] as f32 * 299.0 + px[1] as f32 * 587.0 + px[2] as f32 * 114.0) / 1000.0
}

/// Blend with black
pub fn brightness(img: &mut RgbaImage, factor: f32) {
    for chunk in img.chunks_exact_mut(4) {
        for c in &mut chunk[..3] {
            *c = blend(0.0, *c, factor);
        }
    }
}

/// Blend with the mean grey level of the image
pub fn contrast(img: &mut RgbaImage, factor: f32) {
    let pixels = (img.width() as u64 * img.height() as u64).max(1);
    let total: f32 = img.chunks_exact(4).map(luma).sum();
    let mean = (total / pixels as f32).round();

    for chunk in img.chunks_exact_mut(4) {
        for c in &mut chunk[..3] {
            *c = blend(mean, *c, factor);
        }
    }
}

/// Blend with the greyscale version of each pixel
pub fn saturation(img: &mut RgbaImage, factor: f32) {
    for chunk in img.chunks_exact_mut(4) {
        let grey = luma(chunk);
        for c in &mut chunk[..3] {
            *c = blend(grey, *c, factor);
        }
    }
}

/// Blend with a 3x3 smoothed copy; border pixels are left as-is
pub fn sharpness(img: &mut RgbaImage, factor: f32) {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return;
    }

    // Smoothing kernel: centre 5, neighbours 1, sum 13
    let source = img.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0.0f32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5.0 } else { 1.0 };
                    let p = source.get_pixel(x + dx - 1, y + dy - 1);
                    for (a, c) in acc.iter_mut().zip(p.0.iter()) {
                        *a += *c as f32 * weight;
                    }
                }
            }
            let px = img.get_pixel_mut(x, y);
            for (c, a) in px.0.iter_mut().zip(acc) {
                *c = blend((a / 13.0).round(), *c, factor);
            }
        }
    }
}
