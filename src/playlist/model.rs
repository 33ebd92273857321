/// Data model for playlists and the plugin instances they rotate through.
use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::RefreshError;
use crate::playlist::window::{TimeWindow, parse_clock_time};

/// Opaque plugin settings, passed to the content generator untouched
pub type Settings = BTreeMap<String, serde_json::Value>;

/// When a plugin instance wants new content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Refresh every N seconds
    Interval(u64),
    /// Refresh once a day at the given "HH:MM"
    Scheduled(String),
}

/// One configured content source inside a playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstance {
    pub plugin_id: String,
    pub name: String,
    #[serde(rename = "plugin_settings", default)]
    pub settings: Settings,
    pub refresh: RefreshPolicy,
    #[serde(default)]
    pub latest_refresh_time: Option<NaiveDateTime>,
    /// Always push fresh output to the panel, even when it matches what is shown
    #[serde(rename = "only_show_when_fresh", default)]
    pub only_fresh: bool,
    #[serde(default)]
    pub snooze_until: Option<NaiveDateTime>,
}

impl PluginInstance {
    pub fn new(plugin_id: &str, name: &str, refresh: RefreshPolicy) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            settings: Settings::new(),
            refresh,
            latest_refresh_time: None,
            only_fresh: false,
            snooze_until: None,
        }
    }

    pub fn matches(&self, plugin_id: &str, name: &str) -> bool {
        self.plugin_id == plugin_id && self.name == name
    }

    /// Is this instance due for a new render at `now`?
    pub fn should_refresh(&self, now: NaiveDateTime) -> bool {
        let Some(latest) = self.latest_refresh_time else {
            return true;
        };

        if self.snooze_until.is_some_and(|until| now < until) {
            return false;
        }

        match &self.refresh {
            RefreshPolicy::Interval(seconds) => {
                (now - latest).num_seconds() >= i64::try_from(*seconds).unwrap_or(i64::MAX)
            }
            RefreshPolicy::Scheduled(clock) => match last_occurrence(clock, now) {
                Ok(occurrence) => latest < occurrence,
                Err(e) => {
                    warn!("Instance '{}' has a bad schedule: {}", self.name, e);
                    false
                }
            },
        }
    }

    /// File name of this instance's cached render
    pub fn image_path(&self) -> String {
        format!("{}_{}.png", self.plugin_id, self.name.replace(' ', "_"))
    }
}

/// Most recent occurrence of the daily clock time at or before `now`
fn last_occurrence(clock: &str, now: NaiveDateTime) -> Result<NaiveDateTime, RefreshError> {
    let time = parse_clock_time(clock)?;
    let today = now.date().and_time(time);
    if today <= now {
        return Ok(today);
    }
    today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| RefreshError::Configuration(format!("Schedule '{clock}' out of range")))
}

/// A named, time-windowed rotation of plugin instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub plugins: Vec<PluginInstance>,
    /// Last-served position; anything out of range counts as unset
    #[serde(default)]
    pub current_plugin_index: Option<usize>,
    /// Minimum seconds between playlist-driven renders, overriding the poll interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_interval_seconds: Option<u64>,
}

impl Playlist {
    pub fn new(name: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            name: name.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            plugins: Vec::new(),
            current_plugin_index: None,
            cycle_interval_seconds: None,
        }
    }

    pub fn window(&self) -> Result<TimeWindow, RefreshError> {
        TimeWindow::parse(&self.start_time, &self.end_time).map_err(|e| {
            RefreshError::Configuration(format!("Playlist '{}': {}", self.name, e))
        })
    }

    /// Priority key: window length in minutes, smaller wins
    pub fn priority(&self) -> Result<u32, RefreshError> {
        Ok(self.window()?.duration_minutes())
    }

    /// Add an instance; rejected if the (plugin_id, name) pair already exists
    pub fn add_plugin(&mut self, instance: PluginInstance) -> bool {
        if self.find_plugin(&instance.plugin_id, &instance.name).is_some() {
            warn!(
                "Plugin '{}' with instance '{}' already exists in '{}'",
                instance.plugin_id, instance.name, self.name
            );
            return false;
        }
        self.plugins.push(instance);
        true
    }

    /// Replace settings and refresh policy of an existing instance
    pub fn update_plugin(
        &mut self,
        plugin_id: &str,
        name: &str,
        settings: Settings,
        refresh: RefreshPolicy,
    ) -> bool {
        match self.find_plugin_mut(plugin_id, name) {
            Some(instance) => {
                instance.settings = settings;
                instance.refresh = refresh;
                true
            }
            None => {
                warn!("Plugin '{}' with instance '{}' not found", plugin_id, name);
                false
            }
        }
    }

    pub fn delete_plugin(&mut self, plugin_id: &str, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| !p.matches(plugin_id, name));
        if self.plugins.len() == before {
            warn!("Plugin '{}' with instance '{}' not found", plugin_id, name);
            return false;
        }
        true
    }

    pub fn find_plugin(&self, plugin_id: &str, name: &str) -> Option<&PluginInstance> {
        self.plugins.iter().find(|p| p.matches(plugin_id, name))
    }

    pub fn find_plugin_mut(&mut self, plugin_id: &str, name: &str) -> Option<&mut PluginInstance> {
        self.plugins.iter_mut().find(|p| p.matches(plugin_id, name))
    }

    /// Index of the instance after the last-served one
    fn next_index(&self, current: Option<usize>) -> usize {
        match current {
            Some(i) if i < self.plugins.len() => (i + 1) % self.plugins.len(),
            _ => 0,
        }
    }

    /// Advance the cursor to the next due instance.
    /// Tries each instance at most once; leaves the cursor untouched when none is due.
    pub fn get_next_eligible_plugin(&mut self, now: NaiveDateTime) -> Option<&PluginInstance> {
        let index = self.next_eligible_index(now)?;
        self.current_plugin_index = Some(index);
        self.plugins.get(index)
    }

    /// Same as [`Playlist::get_next_eligible_plugin`] without moving the cursor
    pub fn peek_next_eligible_plugin(&self, now: NaiveDateTime) -> Option<&PluginInstance> {
        self.next_eligible_index(now).and_then(|i| self.plugins.get(i))
    }

    fn next_eligible_index(&self, now: NaiveDateTime) -> Option<usize> {
        let mut cursor = self.current_plugin_index;
        for _ in 0..self.plugins.len() {
            let index = self.next_index(cursor);
            if self.plugins[index].should_refresh(now) {
                return Some(index);
            }
            debug!("Skipping '{}': not due", self.plugins[index].name);
            cursor = Some(index);
        }
        None
    }

    /// Reorder instances to match a full permutation of (plugin_id, name) pairs.
    /// Anything other than an exact permutation is rejected without mutation.
    pub fn reorder_plugins(&mut self, order: &[(String, String)]) -> bool {
        if order.len() != self.plugins.len() {
            return false;
        }

        let mut taken = vec![false; self.plugins.len()];
        let mut indices = Vec::with_capacity(order.len());
        for (plugin_id, name) in order {
            let found = self
                .plugins
                .iter()
                .enumerate()
                .position(|(i, p)| !taken[i] && p.matches(plugin_id, name));
            match found {
                Some(i) => {
                    taken[i] = true;
                    indices.push(i);
                }
                None => return false,
            }
        }

        let mut old: Vec<Option<PluginInstance>> = self.plugins.drain(..).map(Some).collect();
        self.plugins = indices.into_iter().filter_map(|i| old[i].take()).collect();

        if self
            .current_plugin_index
            .is_some_and(|i| i >= self.plugins.len())
        {
            self.current_plugin_index = Some(0);
        }
        true
    }
}
