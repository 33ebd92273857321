/// Geometry transforms: map a generated image onto the panel using tiny-skia.
use image::{Rgba, RgbaImage};
use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::config::{FitMode, Geometry};

/// Scale/crop/pad `src` to exactly `target`. Uncovered area is white.
pub fn fit_image(src: &RgbaImage, target: Geometry, mode: FitMode) -> RgbaImage {
    if src.dimensions() == (target.width, target.height) {
        return src.clone();
    }

    let (Some(src_pixmap), Some(mut canvas)) = (to_pixmap(src), Pixmap::new(target.width, target.height))
    else {
        return RgbaImage::from_pixel(target.width, target.height, Rgba([255, 255, 255, 255]));
    };
    canvas.fill(Color::WHITE);

    let src_w = src.width() as f32;
    let src_h = src.height() as f32;
    let dst_w = target.width as f32;
    let dst_h = target.height as f32;

    let transform = match mode {
        FitMode::Stretch => Transform::from_scale(dst_w / src_w, dst_h / src_h),
        FitMode::Crop => {
            // Scale to fill, maintaining aspect ratio, centre crop
            let scale = (dst_w / src_w).max(dst_h / src_h);
            let sx = (dst_w - src_w * scale) / 2.0;
            let sy = (dst_h - src_h * scale) / 2.0;
            Transform::from_scale(scale, scale).post_translate(sx, sy)
        }
        FitMode::KeepWidth => {
            let scale = (dst_w / src_w).max(dst_h / src_h);
            Transform::from_scale(scale, scale)
        }
        FitMode::Center => {
            let sx = (dst_w - src_w) / 2.0;
            let sy = (dst_h - src_h) / 2.0;
            Transform::from_translate(sx, sy)
        }
        FitMode::Fit => {
            let scale = (dst_w / src_w).min(dst_h / src_h);
            let sx = (dst_w - src_w * scale) / 2.0;
            let sy = (dst_h - src_h * scale) / 2.0;
            Transform::from_scale(scale, scale).post_translate(sx, sy)
        }
    };

    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(0, 0, src_pixmap.as_ref(), &paint, transform, None);

    from_pixmap(&canvas)
}

/// tiny-skia expects premultiplied alpha RGBA
fn to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height())?;
    let data = pixmap.data_mut();
    for (i, pixel) in img.pixels().enumerate() {
        let a = pixel[3] as f32 / 255.0;
        data[i * 4] = (pixel[0] as f32 * a) as u8;
        data[i * 4 + 1] = (pixel[1] as f32 * a) as u8;
        data[i * 4 + 2] = (pixel[2] as f32 * a) as u8;
        data[i * 4 + 3] = pixel[3];
    }
    Some(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    img
}
