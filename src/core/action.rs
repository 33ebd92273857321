/// Refresh actions: what the task renders on one cycle, and the blocking
/// work of rendering and displaying it.
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::display::{DisplayManager, HistoryMeta, ImageFiles};
use crate::error::RefreshError;
use crate::playlist::model::{PluginInstance, Settings};
use crate::playlist::refresh_info::{RefreshInfo, RefreshType};
use crate::render::pipeline::RenderPipeline;
use crate::render::plugins::{ContentGenerator, PluginRegistry};

/// A caller-initiated render
#[derive(Debug, Clone)]
pub enum ManualUpdateRequest {
    /// Render a plugin directly with ad-hoc settings
    Plugin { plugin_id: String, settings: Settings },
    /// Force a render of a saved playlist instance, ignoring its refresh policy
    Instance {
        playlist: String,
        plugin_id: String,
        instance: String,
    },
}

impl ManualUpdateRequest {
    pub fn plugin(plugin_id: &str, settings: Settings) -> Self {
        Self::Plugin {
            plugin_id: plugin_id.to_string(),
            settings,
        }
    }

    pub fn instance(playlist: &str, plugin_id: &str, instance: &str) -> Self {
        Self::Instance {
            playlist: playlist.to_string(),
            plugin_id: plugin_id.to_string(),
            instance: instance.to_string(),
        }
    }
}

/// Timings and outcome of one completed refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshMetrics {
    pub refresh_id: String,
    pub plugin_id: String,
    /// The panel already showed this image, so the driver was skipped
    pub used_cached: bool,
    pub image_hash: String,
    pub request_ms: u64,
    pub generate_ms: u64,
    pub preprocess_ms: u64,
    /// None when the driver was skipped
    pub display_ms: Option<u64>,
}

/// One unit of work for the refresh task
#[derive(Debug, Clone)]
pub(crate) enum RefreshAction {
    Manual {
        plugin_id: String,
        settings: Settings,
    },
    Playlist {
        playlist: String,
        instance: PluginInstance,
        forced: bool,
    },
}

impl RefreshAction {
    /// Turn a manual request into an action against the current config
    pub(crate) fn from_request(request: ManualUpdateRequest, config: &DeviceConfig) -> Result<Self, RefreshError> {
        match request {
            ManualUpdateRequest::Plugin { plugin_id, settings } => Ok(Self::Manual { plugin_id, settings }),
            ManualUpdateRequest::Instance {
                playlist,
                plugin_id,
                instance,
            } => {
                let found = config
                    .playlist_config
                    .get_playlist(&playlist)
                    .and_then(|p| p.find_plugin(&plugin_id, &instance))
                    .ok_or_else(|| {
                        RefreshError::Configuration(format!(
                            "No instance '{instance}' of plugin '{plugin_id}' in playlist '{playlist}'"
                        ))
                    })?;
                Ok(Self::Playlist {
                    playlist,
                    instance: found.clone(),
                    forced: true,
                })
            }
        }
    }

    pub(crate) fn plugin_id(&self) -> &str {
        match self {
            Self::Manual { plugin_id, .. } => plugin_id,
            Self::Playlist { instance, .. } => &instance.plugin_id,
        }
    }

    fn settings(&self) -> &Settings {
        match self {
            Self::Manual { settings, .. } => settings,
            Self::Playlist { instance, .. } => &instance.settings,
        }
    }

    /// Whether an unchanged image must still be pushed to the panel
    fn only_fresh(&self) -> bool {
        match self {
            Self::Manual { .. } => false,
            Self::Playlist { instance, .. } => instance.only_fresh,
        }
    }

    fn history_meta(&self) -> HistoryMeta {
        match self {
            Self::Manual { plugin_id, .. } => HistoryMeta {
                refresh_type: RefreshType::ManualUpdate,
                plugin_id: plugin_id.clone(),
                playlist: None,
                plugin_instance: None,
            },
            Self::Playlist { playlist, instance, .. } => HistoryMeta {
                refresh_type: RefreshType::Playlist,
                plugin_id: instance.plugin_id.clone(),
                playlist: Some(playlist.clone()),
                plugin_instance: Some(instance.name.clone()),
            },
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Manual { plugin_id, .. } => format!("manual update of '{plugin_id}'"),
            Self::Playlist {
                playlist,
                instance,
                forced,
            } => format!(
                "{}'{}' ({}) from playlist '{}'",
                if *forced { "forced render of " } else { "" },
                instance.name,
                instance.plugin_id,
                playlist
            ),
        }
    }
}

/// Everything a render needs, snapshotted from the config while locked
pub(crate) struct RenderJob {
    pub action: RefreshAction,
    pub generator: Arc<dyn ContentGenerator>,
    pub pipeline: RenderPipeline,
    pub files: ImageFiles,
    pub plugin_image_dir: PathBuf,
    /// Fingerprint of what the panel currently shows
    pub last_hash: Option<String>,
    pub now: NaiveDateTime,
}

impl RenderJob {
    pub(crate) fn prepare(
        action: RefreshAction,
        config: &DeviceConfig,
        registry: &PluginRegistry,
        now: NaiveDateTime,
    ) -> Result<Self, RefreshError> {
        let generator = registry.get(action.plugin_id()).ok_or_else(|| {
            RefreshError::Configuration(format!("Unknown plugin '{}'", action.plugin_id()))
        })?;
        Ok(Self {
            generator,
            pipeline: RenderPipeline::from_config(config),
            files: ImageFiles::from_config(config),
            plugin_image_dir: config.plugin_image_dir.clone(),
            last_hash: config.refresh_info.as_ref().map(|r| r.image_hash.clone()),
            now,
            action,
        })
    }

    /// Generate, post-process and (unless unchanged) display. Blocking.
    pub(crate) fn run(&self, display: &Mutex<DisplayManager>) -> Result<RefreshOutcome, RefreshError> {
        let request_start = Instant::now();
        let plugin_id = self.action.plugin_id().to_string();

        let rendered = self.pipeline.execute(self.generator.as_ref(), self.action.settings())?;

        if let RefreshAction::Playlist { instance, .. } = &self.action {
            self.save_plugin_image(instance, &rendered.generated);
        }

        let used_cached =
            !self.action.only_fresh() && self.last_hash.as_deref() == Some(rendered.fingerprint.as_str());

        let display_ms = if used_cached {
            info!("Image unchanged for '{}', skipping display", plugin_id);
            None
        } else {
            let mut display = display.lock().unwrap_or_else(PoisonError::into_inner);
            display.set_files(self.files.clone());
            display
                .display_image(&rendered.generated, &rendered.image, &self.action.history_meta(), self.now)
                .map_err(|e| RefreshError::Output {
                    plugin_id: plugin_id.clone(),
                    message: format!("{e:#}"),
                })
                .map(Some)?
        };

        let metrics = RefreshMetrics {
            refresh_id: uuid::Uuid::new_v4().to_string(),
            plugin_id,
            used_cached,
            image_hash: rendered.fingerprint,
            request_ms: u64::try_from(request_start.elapsed().as_millis()).unwrap_or(u64::MAX),
            generate_ms: rendered.timings.generate_ms,
            preprocess_ms: rendered.timings.preprocess_ms,
            display_ms,
        };
        Ok(RefreshOutcome {
            info: self.refresh_info(&metrics),
            metrics,
        })
    }

    fn refresh_info(&self, metrics: &RefreshMetrics) -> RefreshInfo {
        let meta = self.action.history_meta();
        RefreshInfo {
            refresh_type: meta.refresh_type,
            plugin_id: meta.plugin_id,
            playlist: meta.playlist,
            plugin_instance: meta.plugin_instance,
            refresh_time: self.now,
            image_hash: metrics.image_hash.clone(),
            used_cached: metrics.used_cached,
            refresh_id: Some(metrics.refresh_id.clone()),
            request_ms: Some(metrics.request_ms),
            generate_ms: Some(metrics.generate_ms),
            preprocess_ms: Some(metrics.preprocess_ms),
            display_ms: metrics.display_ms,
        }
    }

    /// Cache the raw render for the instance; failures only warn
    fn save_plugin_image(&self, instance: &PluginInstance, image: &image::RgbaImage) {
        let path = self.plugin_image_dir.join(instance.image_path());
        let result = std::fs::create_dir_all(&self.plugin_image_dir)
            .map_err(anyhow::Error::from)
            .and_then(|()| image.save(&path).map_err(anyhow::Error::from));
        match result {
            Ok(()) => debug!("Cached plugin image at {}", path.display()),
            Err(e) => warn!("Failed to cache plugin image {}: {}", path.display(), e),
        }
    }
}

/// A successful render: the record to persist and the metrics to report
pub(crate) struct RefreshOutcome {
    pub info: RefreshInfo,
    pub metrics: RefreshMetrics,
}
