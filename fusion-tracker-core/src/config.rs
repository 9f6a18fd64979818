//! Storage and persistence tuning.
use serde::{Deserialize, Serialize};
use std::time::Duration;

const fn default_debounce_ms() -> u64 {
    200
}

fn default_namespace() -> String {
    "playthrough:".to_string()
}

fn default_pointer_key() -> String {
    "activePlaythroughId".to_string()
}

fn default_playthrough_name() -> String {
    "Nuzlocke Run".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Key prefix for playthrough records in the bulk store.
    pub namespace: String,
    /// Key of the active id in the pointer store.
    pub active_pointer_key: String,
    /// Bulk-store key the active id was kept under before it moved to the pointer store.
    pub legacy_pointer_key: String,
    pub debounce_ms: u64,
    pub default_playthrough_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            active_pointer_key: default_pointer_key(),
            legacy_pointer_key: default_pointer_key(),
            debounce_ms: default_debounce_ms(),
            default_playthrough_name: default_playthrough_name(),
        }
    }
}

impl TrackerConfig {
    /// Parse a config file; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn record_key(&self, playthrough_id: &str) -> String {
        format!("{}{playthrough_id}", self.namespace)
    }

    /// Playthrough id encoded in a bulk-store key, if the key belongs to this namespace.
    #[must_use]
    pub fn id_from_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.namespace.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TrackerConfig::from_json(r#"{ "debounceMs": 50 }"#).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.namespace, "playthrough:");
        assert_eq!(config.default_playthrough_name, "Nuzlocke Run");
    }

    #[test]
    fn keys_round_trip_through_namespace() {
        let config = TrackerConfig::default();
        let key = config.record_key("abc");
        assert_eq!(key, "playthrough:abc");
        assert_eq!(config.id_from_key(&key), Some("abc"));
        assert_eq!(config.id_from_key("activePlaythroughId"), None);
        assert_eq!(config.id_from_key("playthrough:"), None);
    }
}
