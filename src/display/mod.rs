pub mod drivers;

use chrono::NaiveDateTime;
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::DeviceConfig;
use crate::playlist::refresh_info::RefreshType;

/// Hardware output. Accepts a prepared, panel-sized image.
/// A failed call must leave the panel usable for the next one.
pub trait DisplayDriver: Send {
    fn name(&self) -> &str;

    fn show(&mut self, image: &RgbaImage) -> anyhow::Result<()>;
}

/// Sidecar metadata written next to each history image
#[derive(Debug, Clone, Serialize)]
pub struct HistoryMeta {
    pub refresh_type: RefreshType,
    pub plugin_id: String,
    pub playlist: Option<String>,
    pub plugin_instance: Option<String>,
}

/// File locations for the preview and history copies
#[derive(Debug, Clone)]
pub struct ImageFiles {
    pub current_image_file: PathBuf,
    pub processed_image_file: PathBuf,
    pub history_image_dir: PathBuf,
}

impl ImageFiles {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            current_image_file: config.current_image_file.clone(),
            processed_image_file: config.processed_image_file.clone(),
            history_image_dir: config.history_image_dir.clone(),
        }
    }
}

/// Wraps the driver: keeps preview/history copies, then pushes to the panel.
/// Only the refresh task ever calls into it.
pub struct DisplayManager {
    driver: Box<dyn DisplayDriver>,
    files: ImageFiles,
}

impl DisplayManager {
    pub fn new(driver: Box<dyn DisplayDriver>, files: ImageFiles) -> Self {
        Self { driver, files }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn set_files(&mut self, files: ImageFiles) {
        self.files = files;
    }

    /// Display an image. Preview and history copies are best-effort;
    /// only a driver failure is returned. Returns the driver time in ms.
    pub fn display_image(
        &mut self,
        generated: &RgbaImage,
        processed: &RgbaImage,
        meta: &HistoryMeta,
        now: NaiveDateTime,
    ) -> anyhow::Result<u64> {
        save_best_effort(generated, &self.files.current_image_file, "current image");
        save_best_effort(processed, &self.files.processed_image_file, "processed preview");
        self.save_history(processed, meta, now);

        let start = Instant::now();
        self.driver.show(processed)?;
        let display_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!("Displayed image on '{}' in {}ms", self.driver.name(), display_ms);
        Ok(display_ms)
    }

    fn save_history(&self, processed: &RgbaImage, meta: &HistoryMeta, now: NaiveDateTime) {
        let stamp = now.format("%Y%m%d_%H%M%S");
        let image_path = self.files.history_image_dir.join(format!("display_{stamp}.png"));
        if !save_best_effort(processed, &image_path, "history image") {
            return;
        }

        let sidecar = self.files.history_image_dir.join(format!("display_{stamp}.json"));
        let result = serde_json::to_vec_pretty(meta)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(&sidecar, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!("Failed to write history sidecar {}: {}", sidecar.display(), e);
        }
    }
}

fn save_best_effort(image: &RgbaImage, path: &Path, what: &str) -> bool {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create {} for {}: {}", parent.display(), what, e);
            return false;
        }
    }
    match image.save(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save {} to {}: {}", what, path.display(), e);
            false
        }
    }
}
