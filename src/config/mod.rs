use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::playlist::manager::PlaylistManager;
use crate::playlist::refresh_info::RefreshInfo;

/// Default poll interval between playlist checks (one hour)
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 60 * 60;

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Top-level device configuration, persisted as a single JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    /// IANA zone that playlist windows and daily schedules are read in
    pub timezone: String,
    /// Physical panel resolution (width, height) in landscape terms
    pub resolution: [u32; 2],
    pub orientation: Orientation,
    /// Rotate the final image by 180 degrees (panel mounted upside down)
    pub inverted_image: bool,
    pub display_type: DisplayType,
    /// Target of the png/framebuffer drivers
    pub output_path: PathBuf,
    pub image_settings: ImageSettings,
    /// How long the refresh loop sleeps between playlist checks
    pub plugin_cycle_interval_seconds: u64,
    pub plugin_image_dir: PathBuf,
    pub history_image_dir: PathBuf,
    pub current_image_file: PathBuf,
    pub processed_image_file: PathBuf,
    pub playlist_config: PlaylistManager,
    pub refresh_info: Option<RefreshInfo>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut playlist_config = PlaylistManager::default();
        playlist_config.add_default_playlist();
        Self {
            name: "eink-player".to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            resolution: [800, 480],
            orientation: Orientation::Horizontal,
            inverted_image: false,
            display_type: DisplayType::Png,
            output_path: PathBuf::from("output.png"),
            image_settings: ImageSettings::default(),
            plugin_cycle_interval_seconds: DEFAULT_CYCLE_INTERVAL_SECS,
            plugin_image_dir: PathBuf::from("images/plugins"),
            history_image_dir: PathBuf::from("images/history"),
            current_image_file: PathBuf::from("images/current_image.png"),
            processed_image_file: PathBuf::from("images/processed_image.png"),
            playlist_config,
            refresh_info: None,
        }
    }
}

impl DeviceConfig {
    /// Geometry the content generators should render at.
    /// Vertical panels get their dimensions swapped; the pipeline rotates back.
    pub fn render_geometry(&self) -> Geometry {
        let [width, height] = self.resolution;
        match self.orientation {
            Orientation::Horizontal => Geometry { width, height },
            Orientation::Vertical => Geometry {
                width: height,
                height: width,
            },
        }
    }

    /// Geometry of the physical panel
    pub fn panel_geometry(&self) -> Geometry {
        let [width, height] = self.resolution;
        Geometry { width, height }
    }

    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.plugin_cycle_interval_seconds.max(1))
    }
}

/// Output size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    /// Save each displayed image as PNG (development / mock panel)
    #[default]
    Png,
    /// Write raw pixels to a framebuffer device
    Framebuffer,
    /// Output raw pixels to stdout (for piping)
    Raw,
}

impl std::str::FromStr for DisplayType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" | "mock" => Ok(DisplayType::Png),
            "framebuffer" | "fb" => Ok(DisplayType::Framebuffer),
            "raw" | "stdout" => Ok(DisplayType::Raw),
            _ => Err(format!("Unknown display type: {s}")),
        }
    }
}

/// How a generated image is mapped onto the panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to cover, centre crop the overflow
    #[default]
    Crop,
    /// Scale to cover, crop anchored at the top-left
    KeepWidth,
    /// Scale to fit inside, pad the rest
    Fit,
    /// Scale each axis independently
    Stretch,
    /// No scaling, centred
    Center,
}

/// Post-processing applied to every image before it reaches the panel.
/// Enhancement factors follow the usual convention: 1.0 leaves the image unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpness: f32,
    pub fit: FitMode,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpness: 1.0,
            fit: FitMode::Crop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_swaps_render_geometry() {
        let config = DeviceConfig {
            resolution: [800, 480],
            orientation: Orientation::Vertical,
            ..DeviceConfig::default()
        };
        assert_eq!(
            config.render_geometry(),
            Geometry {
                width: 480,
                height: 800
            }
        );
        assert_eq!(config.panel_geometry().width, 800);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DeviceConfig = serde_json::from_str(
            r#"{"resolution": [640, 400], "orientation": "vertical", "image_settings": {"fit": "keep_width"}}"#,
        )
        .unwrap();
        assert_eq!(config.resolution, [640, 400]);
        assert_eq!(config.orientation, Orientation::Vertical);
        assert_eq!(config.image_settings.fit, FitMode::KeepWidth);
        assert_eq!(config.image_settings.brightness, 1.0);
        assert_eq!(config.plugin_cycle_interval_seconds, DEFAULT_CYCLE_INTERVAL_SECS);
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn test_display_type_aliases() {
        assert_eq!("mock".parse::<DisplayType>().unwrap(), DisplayType::Png);
        assert_eq!("fb".parse::<DisplayType>().unwrap(), DisplayType::Framebuffer);
        assert!("epd7in5".parse::<DisplayType>().is_err());
    }
}
