/// Concrete panel outputs, selected by `display_type`.
use image::RgbaImage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::config::{DeviceConfig, DisplayType};
use crate::display::DisplayDriver;

/// Build the driver configured for this device
pub fn driver_for(config: &DeviceConfig) -> Box<dyn DisplayDriver> {
    match config.display_type {
        DisplayType::Png => Box::new(PngDisplay::new(config.output_path.clone())),
        DisplayType::Framebuffer => Box::new(FramebufferDisplay::new(config.output_path.clone())),
        DisplayType::Raw => Box::new(RawDisplay),
    }
}

/// Save each frame as PNG (mock panel for development)
pub struct PngDisplay {
    path: PathBuf,
}

impl PngDisplay {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DisplayDriver for PngDisplay {
    fn name(&self) -> &str {
        "png"
    }

    fn show(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image
            .save(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to save PNG {}: {}", self.path.display(), e))?;
        debug!("Saved frame to {}", self.path.display());
        Ok(())
    }
}

/// Write BGRA32 pixels to a framebuffer device (e.g. /dev/fb0)
pub struct FramebufferDisplay {
    device: PathBuf,
}

impl FramebufferDisplay {
    pub fn new(device: PathBuf) -> Self {
        Self { device }
    }
}

impl DisplayDriver for FramebufferDisplay {
    fn name(&self) -> &str {
        "framebuffer"
    }

    fn show(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        let mut frame = Vec::with_capacity(image.len());
        for px in image.pixels() {
            frame.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        let mut fb = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.device)?;
        fb.write_all(&frame)?;
        fb.flush()?;
        Ok(())
    }
}

/// Output raw RGBA pixels to stdout (for piping)
pub struct RawDisplay;

impl DisplayDriver for RawDisplay {
    fn name(&self) -> &str {
        "raw"
    }

    fn show(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(image.as_raw())?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_display_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel").join("out.png");
        let mut display = PngDisplay::new(path.clone());
        display
            .show(&RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255])))
            .unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 3);
    }

    #[test]
    fn test_framebuffer_writes_bgra() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fb0");
        let mut display = FramebufferDisplay::new(path.clone());
        display
            .show(&RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 4])))
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_driver_selection() {
        let config = DeviceConfig {
            display_type: DisplayType::Framebuffer,
            ..DeviceConfig::default()
        };
        assert_eq!(driver_for(&config).name(), "framebuffer");
        assert_eq!(driver_for(&DeviceConfig::default()).name(), "png");
    }
}
