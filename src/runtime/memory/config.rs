//! Garbage collection configuration

use serde::{Deserialize, Serialize};

use crate::runtime::memory::error::ConfigError;

pub const ENV_LOG_COLLECTIONS: &str = "RTGC_LOG_COLLECTIONS";
pub const ENV_STATS_HISTORY: &str = "RTGC_STATS_HISTORY";
pub const ENV_INITIAL_CAPACITY: &str = "RTGC_INITIAL_CAPACITY";
pub const ENV_VERIFY: &str = "RTGC_VERIFY";

/// Garbage collection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Emit the per-collection metrics line at `info` (otherwise `debug`)
    pub log_collections: bool,
    /// Number of recent collection stats kept for introspection
    pub stats_history: usize,
    /// Registry slots reserved up front
    pub initial_capacity: usize,
    /// Check after every sweep that survivors only reference live objects
    pub verify_heap: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            log_collections: true,
            stats_history: 16,
            initial_capacity: 0,
            verify_heap: false,
        }
    }
}

impl GcConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_LOG_COLLECTIONS)
            && let Ok(enabled) = parse_bool(ENV_LOG_COLLECTIONS, &value)
        {
            config.log_collections = enabled;
        }

        if let Some(value) = lookup(ENV_STATS_HISTORY)
            && let Ok(history) = parse_count(ENV_STATS_HISTORY, &value)
        {
            config.stats_history = history;
        }

        if let Some(value) = lookup(ENV_INITIAL_CAPACITY)
            && let Ok(capacity) = parse_count(ENV_INITIAL_CAPACITY, &value)
        {
            config.initial_capacity = capacity;
        }

        if let Some(value) = lookup(ENV_VERIFY)
            && let Ok(verify) = parse_bool(ENV_VERIFY, &value)
        {
            config.verify_heap = verify;
        }

        config
    }

    pub const fn with_verify_heap(mut self, verify_heap: bool) -> Self {
        self.verify_heap = verify_heap;
        self
    }

    pub const fn with_stats_history(mut self, stats_history: usize) -> Self {
        self.stats_history = stats_history;
        self
    }
}

pub fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_owned(),
        }),
    }
}

pub fn parse_count(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidCount {
            key,
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(GcConfig::from_lookup(|_| None), GcConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = GcConfig::from_lookup(lookup_from(&[
            (ENV_LOG_COLLECTIONS, "off"),
            (ENV_STATS_HISTORY, "4"),
            (ENV_INITIAL_CAPACITY, " 1024 "),
            (ENV_VERIFY, "YES"),
        ]));

        assert!(!config.log_collections);
        assert_eq!(config.stats_history, 4);
        assert_eq!(config.initial_capacity, 1024);
        assert!(config.verify_heap);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = GcConfig::from_lookup(lookup_from(&[
            (ENV_STATS_HISTORY, "-3"),
            (ENV_VERIFY, "maybe"),
        ]));

        assert_eq!(config, GcConfig::default());
        assert_eq!(
            parse_bool(ENV_VERIFY, "maybe"),
            Err(ConfigError::InvalidBool {
                key: ENV_VERIFY,
                value: "maybe".into()
            })
        );
    }

    #[test]
    fn deserializes_partial_json() {
        let config: GcConfig =
            serde_json::from_str(r#"{"verify_heap": true}"#).expect("valid config");
        assert!(config.verify_heap);
        assert_eq!(config.stats_history, GcConfig::default().stats_history);
    }
}
