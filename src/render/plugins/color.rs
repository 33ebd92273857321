/// Solid color plugin.
/// Fills the whole panel with one `#RRGGBB` color; handy for clearing a panel.
use image::{Rgba, RgbaImage};

use crate::config::Geometry;
use crate::playlist::model::Settings;
use crate::render::plugins::{ContentGenerator, setting_str};

pub struct ColorGenerator;

impl ContentGenerator for ColorGenerator {
    fn id(&self) -> &str {
        "color"
    }

    fn generate(&self, settings: &Settings, geometry: Geometry) -> anyhow::Result<RgbaImage> {
        let color = setting_str(settings, "color").unwrap_or("#ffffff");
        let (r, g, b) = parse_color(color)?;
        Ok(RgbaImage::from_pixel(
            geometry.width,
            geometry.height,
            Rgba([r, g, b, 255]),
        ))
    }
}

/// Parse a hex color string (#RRGGBB) to (r, g, b)
pub fn parse_color(color: &str) -> anyhow::Result<(u8, u8, u8)> {
    let s = color.trim().trim_start_matches('#');
    if s.len() != 6 || !s.is_ascii() {
        anyhow::bail!("Invalid color '{color}', expected #RRGGBB");
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| anyhow::anyhow!("Invalid color '{color}'"))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
