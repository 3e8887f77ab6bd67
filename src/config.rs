use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_AUTOSAVE_MS: u64 = 2_000;
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding one draft store file per tenant.
    pub data_dir: PathBuf,
    /// How often the autosaver checks for unsaved draft changes.
    pub autosave_interval: Duration,
    /// Store log appends between compactions.
    pub compact_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            autosave_interval: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Read `ARISYNC_DATA_DIR`, `ARISYNC_AUTOSAVE_MS` and
    /// `ARISYNC_COMPACT_THRESHOLD`; unset or unparsable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("ARISYNC_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into());
        let autosave_ms: u64 = lookup("ARISYNC_AUTOSAVE_MS")
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_AUTOSAVE_MS);
        let compact_threshold: u64 = lookup("ARISYNC_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_COMPACT_THRESHOLD);

        Self {
            data_dir: PathBuf::from(data_dir),
            autosave_interval: Duration::from_millis(autosave_ms),
            compact_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        assert_eq!(EngineConfig::from_lookup(|_| None), EngineConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ARISYNC_DATA_DIR", "/var/lib/arisync"),
            ("ARISYNC_AUTOSAVE_MS", "500"),
            ("ARISYNC_COMPACT_THRESHOLD", "50"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/arisync"));
        assert_eq!(config.autosave_interval, Duration::from_millis(500));
        assert_eq!(config.compact_threshold, 50);
    }

    #[test]
    fn garbage_and_zero_fall_back() {
        let config = EngineConfig::from_lookup(|k| match k {
            "ARISYNC_AUTOSAVE_MS" => Some("soon".into()),
            "ARISYNC_COMPACT_THRESHOLD" => Some("0".into()),
            _ => None,
        });
        assert_eq!(config.autosave_interval, Duration::from_millis(DEFAULT_AUTOSAVE_MS));
        assert_eq!(config.compact_threshold, DEFAULT_COMPACT_THRESHOLD);
    }
}
