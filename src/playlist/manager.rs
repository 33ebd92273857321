/// Playlist manager: owns all playlists and decides which one is active.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::playlist::model::{PluginInstance, Playlist};
use crate::playlist::refresh_info::RefreshInfo;

pub const DEFAULT_PLAYLIST_NAME: &str = "Default";
pub const DEFAULT_PLAYLIST_START: &str = "00:00";
pub const DEFAULT_PLAYLIST_END: &str = "24:00";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistManager {
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    /// Name of the playlist picked by the last resolution
    #[serde(default)]
    pub active_playlist: Option<String>,
}

/// A playlist-driven render chosen by the rotation
#[derive(Debug, Clone)]
pub struct ScheduledRender {
    pub playlist: String,
    pub instance: PluginInstance,
}

impl PlaylistManager {
    pub fn new(playlists: Vec<Playlist>) -> Self {
        Self {
            playlists,
            active_playlist: None,
        }
    }

    pub fn playlist_names(&self) -> Vec<&str> {
        self.playlists.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn add_default_playlist(&mut self) {
        self.playlists.push(Playlist::new(
            DEFAULT_PLAYLIST_NAME,
            DEFAULT_PLAYLIST_START,
            DEFAULT_PLAYLIST_END,
        ));
    }

    /// Create a playlist; empty times default to the whole day
    pub fn add_playlist(&mut self, name: &str, start_time: Option<&str>, end_time: Option<&str>) -> bool {
        if self.get_playlist(name).is_some() {
            warn!("Playlist '{}' already exists", name);
            return false;
        }
        let start = start_time.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_PLAYLIST_START);
        let end = end_time.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_PLAYLIST_END);
        self.playlists.push(Playlist::new(name, start, end));
        true
    }

    pub fn update_playlist(&mut self, old_name: &str, new_name: &str, start_time: &str, end_time: &str) -> bool {
        if old_name != new_name && self.get_playlist(new_name).is_some() {
            warn!("Playlist '{}' already exists", new_name);
            return false;
        }
        match self.get_playlist_mut(old_name) {
            Some(playlist) => {
                playlist.name = new_name.to_string();
                playlist.start_time = start_time.to_string();
                playlist.end_time = end_time.to_string();
                true
            }
            None => {
                warn!("Playlist '{}' not found", old_name);
                false
            }
        }
    }

    pub fn delete_playlist(&mut self, name: &str) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.name != name);
        self.playlists.len() != before
    }

    pub fn get_playlist(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn get_playlist_mut(&mut self, name: &str) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.name == name)
    }

    pub fn add_plugin_to_playlist(&mut self, playlist_name: &str, instance: PluginInstance) -> bool {
        match self.get_playlist_mut(playlist_name) {
            Some(playlist) => playlist.add_plugin(instance),
            None => {
                warn!("Playlist '{}' not found", playlist_name);
                false
            }
        }
    }

    /// First instance with this (plugin_id, name) across all playlists
    pub fn find_plugin(&self, plugin_id: &str, name: &str) -> Option<&PluginInstance> {
        self.playlists
            .iter()
            .find_map(|p| p.find_plugin(plugin_id, name))
    }

    /// The playlist whose window contains `now`; the narrowest window wins,
    /// ties go to the playlist created first.
    pub fn determine_active_playlist(&self, now: NaiveDateTime) -> Option<&Playlist> {
        self.active_index(now).map(|i| &self.playlists[i])
    }

    fn active_index(&self, now: NaiveDateTime) -> Option<usize> {
        let time = now.time();
        self.playlists
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p.window() {
                Ok(window) if window.contains(time) => Some((i, p)),
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping playlist: {}", e);
                    None
                }
            })
            .filter_map(|(i, p)| p.priority().ok().map(|priority| (i, priority)))
            .min_by_key(|&(_, priority)| priority)
            .map(|(i, _)| i)
    }

    /// Resolve the next playlist-driven render, advancing the active playlist's cursor.
    pub fn determine_next_plugin(
        &mut self,
        last_refresh: Option<&RefreshInfo>,
        now: NaiveDateTime,
    ) -> Option<ScheduledRender> {
        let Some(index) = self.active_index(now) else {
            self.active_playlist = None;
            info!("No active playlist at {}", now.format("%H:%M"));
            return None;
        };

        let playlist = &mut self.playlists[index];
        self.active_playlist = Some(playlist.name.clone());

        if playlist.plugins.is_empty() {
            info!("Active playlist '{}' has no plugins", playlist.name);
            return None;
        }

        if let (Some(cycle), Some(last)) = (playlist.cycle_interval_seconds, last_refresh) {
            let elapsed = (now - last.refresh_time).num_seconds();
            if elapsed < i64::try_from(cycle).unwrap_or(i64::MAX) {
                debug!(
                    "Not time to rotate '{}': last refresh {}s ago, cycle {}s",
                    playlist.name, elapsed, cycle
                );
                return None;
            }
        }

        let name = playlist.name.clone();
        match playlist.get_next_eligible_plugin(now) {
            Some(instance) => {
                info!("Next plugin: '{}' from playlist '{}'", instance.name, name);
                Some(ScheduledRender {
                    playlist: name,
                    instance: instance.clone(),
                })
            }
            None => {
                info!("No eligible plugin in active playlist '{}'", name);
                None
            }
        }
    }

    /// Record a finished render on the originating instance
    pub fn mark_refreshed(&mut self, playlist: &str, plugin_id: &str, name: &str, at: NaiveDateTime) -> bool {
        match self
            .get_playlist_mut(playlist)
            .and_then(|p| p.find_plugin_mut(plugin_id, name))
        {
            Some(instance) => {
                instance.latest_refresh_time = Some(at);
                true
            }
            None => {
                warn!(
                    "Instance '{}' ({}) vanished from playlist '{}' during render",
                    name, plugin_id, playlist
                );
                false
            }
        }
    }
}
