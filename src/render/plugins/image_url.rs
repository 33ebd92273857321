/// Remote image plugin.
/// Downloads an image over HTTP with a bounded timeout.
use image::RgbaImage;
use std::time::Duration;
use tracing::debug;

use crate::config::Geometry;
use crate::playlist::model::Settings;
use crate::render::plugins::{ContentGenerator, setting_str};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ImageUrlGenerator {
    timeout: Duration,
}

impl Default for ImageUrlGenerator {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ImageUrlGenerator {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ContentGenerator for ImageUrlGenerator {
    fn id(&self) -> &str {
        "image_url"
    }

    fn generate(&self, settings: &Settings, _geometry: Geometry) -> anyhow::Result<RgbaImage> {
        let url = setting_str(settings, "url")?;
        debug!("Fetching image: {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let bytes = client.get(url).send()?.error_for_status()?.bytes()?;

        let img = image::load_from_memory(&bytes)
            .map_err(|e| anyhow::anyhow!("Failed to decode image from {}: {}", url, e))?;
        Ok(img.to_rgba8())
    }
}
