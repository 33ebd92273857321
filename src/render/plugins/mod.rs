pub mod color;
pub mod image_file;
pub mod image_url;

use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{FitMode, Geometry};
use crate::playlist::model::Settings;

/// A content source. Given settings and target geometry, produce an image or fail.
/// Implementations must not keep state between calls beyond what `settings` carries.
pub trait ContentGenerator: Send + Sync {
    fn id(&self) -> &str;

    fn generate(&self, settings: &Settings, geometry: Geometry) -> anyhow::Result<RgbaImage>;

    /// Plugin-specific fit, overriding the device setting
    fn fit_mode(&self) -> Option<FitMode> {
        None
    }
}

/// Lookup table from plugin id to generator
#[derive(Clone, Default)]
pub struct PluginRegistry {
    generators: HashMap<String, Arc<dyn ContentGenerator>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in generator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(color::ColorGenerator));
        registry.register(Arc::new(image_file::ImageFileGenerator));
        registry.register(Arc::new(image_url::ImageUrlGenerator::default()));
        registry
    }

    pub fn register(&mut self, generator: Arc<dyn ContentGenerator>) {
        tracing::debug!("Registered plugin '{}'", generator.id());
        self.generators.insert(generator.id().to_string(), generator);
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn ContentGenerator>> {
        self.generators.get(plugin_id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.generators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Fetch a required string setting
pub fn setting_str<'a>(settings: &'a Settings, key: &str) -> anyhow::Result<&'a str> {
    settings
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required setting '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::with_builtins();
        assert_eq!(registry.ids(), ["color", "image_file", "image_url"]);
        assert!(registry.get("clock").is_none());
    }

    #[test]
    fn test_setting_str() {
        let mut settings = Settings::new();
        settings.insert("path".into(), serde_json::json!("a.png"));
        settings.insert("empty".into(), serde_json::json!(""));
        settings.insert("number".into(), serde_json::json!(3));
        assert_eq!(setting_str(&settings, "path").unwrap(), "a.png");
        assert!(setting_str(&settings, "empty").is_err());
        assert!(setting_str(&settings, "number").is_err());
        assert!(setting_str(&settings, "missing").is_err());
    }
}
