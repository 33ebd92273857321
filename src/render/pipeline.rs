/// Render pipeline: generate, post-process and fingerprint one image.
use image::{RgbaImage, imageops};
use std::time::Instant;
use tracing::debug;

use crate::config::{DeviceConfig, FitMode, Geometry, ImageSettings, Orientation};
use crate::error::RefreshError;
use crate::playlist::model::Settings;
use crate::render::enhance::apply_enhancements;
use crate::render::fit::fit_image;
use crate::render::plugins::ContentGenerator;

/// Per-stage timings, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub generate_ms: u64,
    pub preprocess_ms: u64,
}

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// What the generator produced, before any transform
    pub generated: RgbaImage,
    /// Final panel-sized image
    pub image: RgbaImage,
    pub fingerprint: String,
    pub timings: StageTimings,
}

/// Device-specific transform settings, snapshotted from the config per render
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    render_geometry: Geometry,
    panel_geometry: Geometry,
    orientation: Orientation,
    inverted: bool,
    image_settings: ImageSettings,
}

impl RenderPipeline {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            render_geometry: config.render_geometry(),
            panel_geometry: config.panel_geometry(),
            orientation: config.orientation,
            inverted: config.inverted_image,
            image_settings: config.image_settings,
        }
    }

    /// Run the generator and the post-processing chain. Never retries.
    pub fn execute(
        &self,
        generator: &dyn ContentGenerator,
        settings: &Settings,
    ) -> Result<RenderedImage, RefreshError> {
        let gen_start = Instant::now();
        let generated = generator
            .generate(settings, self.render_geometry)
            .map_err(|e| RefreshError::Generation {
                plugin_id: generator.id().to_string(),
                message: format!("{e:#}"),
            })?;
        let generate_ms = elapsed_ms(gen_start);

        if generated.width() == 0 || generated.height() == 0 {
            return Err(RefreshError::Generation {
                plugin_id: generator.id().to_string(),
                message: "Plugin returned an empty image".to_string(),
            });
        }

        let pre_start = Instant::now();
        let fit = generator.fit_mode().unwrap_or(self.image_settings.fit);
        let image = self.post_process(&generated, fit);
        let fingerprint = fingerprint(&image);
        let preprocess_ms = elapsed_ms(pre_start);

        debug!(
            "Rendered '{}' in {}ms (+{}ms preprocess), fingerprint {}",
            generator.id(),
            generate_ms,
            preprocess_ms,
            fingerprint
        );

        Ok(RenderedImage {
            generated,
            image,
            fingerprint,
            timings: StageTimings {
                generate_ms,
                preprocess_ms,
            },
        })
    }

    /// Orientation, then fit to panel, then inversion and enhancement
    fn post_process(&self, generated: &RgbaImage, fit: FitMode) -> RgbaImage {
        let oriented = match self.orientation {
            Orientation::Horizontal => generated.clone(),
            // Rotate a quarter turn counter-clockwise back to landscape
            Orientation::Vertical => imageops::rotate270(generated),
        };

        let mut image = fit_image(&oriented, self.panel_geometry, fit);
        if self.inverted {
            imageops::rotate180_in_place(&mut image);
        }
        apply_enhancements(&mut image, &self.image_settings);
        image
    }
}

/// Stable content fingerprint: MD5 of the RGB bytes, alpha ignored
pub fn fingerprint(image: &RgbaImage) -> String {
    let mut ctx = md5::Context::new();
    for chunk in image.chunks_exact(4) {
        ctx.consume(&chunk[..3]);
    }
    format!("{:x}", ctx.compute())
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::plugins::color::ColorGenerator;
    use image::Rgba;

    struct Gradient;

    impl ContentGenerator for Gradient {
        fn id(&self) -> &str {
            "gradient"
        }

        fn generate(&self, _settings: &Settings, geometry: Geometry) -> anyhow::Result<RgbaImage> {
            Ok(RgbaImage::from_fn(geometry.width, geometry.height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
            }))
        }
    }

    struct Broken;

    impl ContentGenerator for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn generate(&self, _settings: &Settings, _geometry: Geometry) -> anyhow::Result<RgbaImage> {
            Err(anyhow::anyhow!("upstream returned 503").context("fetching tiles"))
        }
    }

    fn config(orientation: Orientation) -> DeviceConfig {
        DeviceConfig {
            resolution: [40, 20],
            orientation,
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn test_output_matches_panel() {
        let pipeline = RenderPipeline::from_config(&config(Orientation::Horizontal));
        let out = pipeline.execute(&Gradient, &Settings::new()).unwrap();
        assert_eq!(out.generated.dimensions(), (40, 20));
        assert_eq!(out.image.dimensions(), (40, 20));
        assert_eq!(out.image, out.generated);
    }

    #[test]
    fn test_vertical_generates_portrait_and_rotates() {
        let pipeline = RenderPipeline::from_config(&config(Orientation::Vertical));
        let out = pipeline.execute(&Gradient, &Settings::new()).unwrap();
        assert_eq!(out.generated.dimensions(), (20, 40));
        assert_eq!(out.image.dimensions(), (40, 20));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let pipeline = RenderPipeline::from_config(&config(Orientation::Horizontal));
        let a = pipeline.execute(&Gradient, &Settings::new()).unwrap();
        let b = pipeline.execute(&Gradient, &Settings::new()).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);

        let mut settings = Settings::new();
        settings.insert("color".into(), serde_json::json!("#000000"));
        let c = pipeline.execute(&ColorGenerator, &settings).unwrap();
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_fingerprint_ignores_alpha() {
        let opaque = RgbaImage::from_pixel(2, 2, Rgba([5, 6, 7, 255]));
        let translucent = RgbaImage::from_pixel(2, 2, Rgba([5, 6, 7, 10]));
        assert_eq!(fingerprint(&opaque), fingerprint(&translucent));
    }

    #[test]
    fn test_inverted_rotates_half_turn() {
        let mut cfg = config(Orientation::Horizontal);
        cfg.inverted_image = true;
        let out = RenderPipeline::from_config(&cfg)
            .execute(&Gradient, &Settings::new())
            .unwrap();
        assert_eq!(out.image.get_pixel(0, 0), out.generated.get_pixel(39, 19));
    }

    #[test]
    fn test_generation_error_is_typed() {
        let pipeline = RenderPipeline::from_config(&config(Orientation::Horizontal));
        match pipeline.execute(&Broken, &Settings::new()) {
            Err(RefreshError::Generation { plugin_id, message }) => {
                assert_eq!(plugin_id, "broken");
                assert!(message.contains("fetching tiles"));
                assert!(message.contains("503"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
    }
}
