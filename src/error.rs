/// Error types for the refresh pipeline.
use std::path::PathBuf;

/// Failure of one refresh cycle (or of a request to start one).
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The content generator failed. Isolated to one instance/tick.
    #[error("Plugin '{plugin_id}' failed to generate an image: {message}")]
    Generation { plugin_id: String, message: String },

    /// The display driver rejected the image.
    #[error("Display output failed for plugin '{plugin_id}': {message}")]
    Output { plugin_id: String, message: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Malformed playlist/instance data or an unknown plugin id.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Refresh task is not running")]
    NotRunning,

    #[error("Refresh task stopped before the request completed")]
    Stopped,
}

impl RefreshError {
    /// Plugin id the failure is attributed to, if any.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            RefreshError::Generation { plugin_id, .. } | RefreshError::Output { plugin_id, .. } => {
                Some(plugin_id)
            }
            _ => None,
        }
    }
}

/// Config store failures
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}
