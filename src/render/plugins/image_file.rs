/// Image file plugin.
/// Loads a PNG/JPG/BMP from disk; the pipeline letterboxes it onto the panel.
use image::RgbaImage;
use std::path::Path;
use tracing::debug;

use crate::config::{FitMode, Geometry};
use crate::playlist::model::Settings;
use crate::render::plugins::{ContentGenerator, setting_str};

pub struct ImageFileGenerator;

impl ContentGenerator for ImageFileGenerator {
    fn id(&self) -> &str {
        "image_file"
    }

    fn generate(&self, settings: &Settings, _geometry: Geometry) -> anyhow::Result<RgbaImage> {
        let path = Path::new(setting_str(settings, "path")?);
        debug!("Loading image: {}", path.display());

        let img = image::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to load image {}: {}", path.display(), e))?;
        Ok(img.to_rgba8())
    }

    fn fit_mode(&self) -> Option<FitMode> {
        Some(FitMode::Fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        RgbaImage::from_pixel(6, 2, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let mut settings = Settings::new();
        settings.insert("path".into(), serde_json::json!(path.to_str().unwrap()));
        let img = ImageFileGenerator
            .generate(&settings, Geometry { width: 10, height: 10 })
            .unwrap();
        assert_eq!(img.dimensions(), (6, 2));
    }

    #[test]
    fn test_missing_file_fails() {
        let mut settings = Settings::new();
        settings.insert("path".into(), serde_json::json!("/nonexistent/photo.png"));
        let err = ImageFileGenerator
            .generate(&settings, Geometry { width: 10, height: 10 })
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/photo.png"));
    }
}
