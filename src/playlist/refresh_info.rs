/// Record of the last successful render, persisted with the device config.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshType {
    #[serde(rename = "Manual Update")]
    ManualUpdate,
    #[serde(rename = "Playlist")]
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshInfo {
    pub refresh_type: RefreshType,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_instance: Option<String>,
    pub refresh_time: NaiveDateTime,
    /// Fingerprint of the image currently on the panel
    pub image_hash: String,
    #[serde(default)]
    pub used_cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocess_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_parses() {
        let info: RefreshInfo = serde_json::from_str(
            r#"{
                "refresh_type": "Manual Update",
                "plugin_id": "clock",
                "refresh_time": "2025-03-10T10:00:00",
                "image_hash": "abc"
            }"#,
        )
        .unwrap();
        assert_eq!(info.refresh_type, RefreshType::ManualUpdate);
        assert!(info.playlist.is_none());
        assert!(!info.used_cached);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["refresh_type"], "Manual Update");
        assert!(json.get("playlist").is_none());
    }
}
