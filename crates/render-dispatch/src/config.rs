//! Configuration for the render dispatcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

/// Longest accepted render timeout. Deadlines are computed as
/// `Instant::now() + timeout`, which must not overflow.
pub const MAX_RENDER_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const DEFAULT_RENDER_TIMEOUT_SECS: f64 = 60.0;

/// Configuration for the render dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of render worker threads.
    pub thread_count: usize,

    /// Highest zoom level the host should request. Advisory only; the
    /// dispatcher does not enforce it. Negative values are read as their
    /// absolute value.
    #[serde(deserialize_with = "deserialize_zoom")]
    pub max_zoom: u32,

    /// How long a caller waits for a render, in seconds.
    pub render_timeout_secs: f64,

    /// Directory scanned for fonts when the engine starts.
    pub font_path: Option<PathBuf>,

    /// Report style parse failures as errors instead of the fallback image.
    pub strict_styles: bool,

    /// Bound on queued jobs. `None` means unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            max_zoom: 19,
            render_timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            font_path: None,
            strict_styles: false,
            queue_capacity: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl DispatchConfig {
    /// Load configuration from environment variables.
    ///
    /// Values that fail to parse are logged and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: DispatchConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup. Split out from [`from_env`] so the
    /// parsing rules can be exercised without touching process state.
    ///
    /// [`from_env`]: DispatchConfig::from_env
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("RENDER_THREAD_COUNT") {
            match val.trim().parse::<usize>() {
                Ok(count) if count > 0 => self.thread_count = count,
                _ => warn!(
                    key = "RENDER_THREAD_COUNT",
                    value = %val,
                    default = self.thread_count,
                    "Invalid thread count, using default"
                ),
            }
        }

        if let Some(val) = lookup("RENDER_MAX_ZOOM") {
            match val.trim().parse::<i64>() {
                Ok(zoom) => self.max_zoom = normalize_zoom(zoom),
                Err(_) => warn!(
                    key = "RENDER_MAX_ZOOM",
                    value = %val,
                    default = self.max_zoom,
                    "Invalid max zoom, using default"
                ),
            }
        }

        if let Some(val) = lookup("RENDER_TIMEOUT_SECS") {
            match val.trim().parse::<f64>() {
                Ok(secs) if timeout_from_secs(secs).is_some() => self.render_timeout_secs = secs,
                _ => warn!(
                    key = "RENDER_TIMEOUT_SECS",
                    value = %val,
                    default = self.render_timeout_secs,
                    "Invalid render timeout, using default"
                ),
            }
        }

        if let Some(val) = lookup("RENDER_FONT_PATH") {
            let val = val.trim();
            self.font_path = (!val.is_empty()).then(|| PathBuf::from(val));
        }

        if let Some(val) = lookup("RENDER_STRICT_STYLES") {
            self.strict_styles = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("RENDER_QUEUE_CAPACITY") {
            match val.trim().parse::<usize>() {
                Ok(0) => self.queue_capacity = None,
                Ok(capacity) => self.queue_capacity = Some(capacity),
                Err(_) => warn!(
                    key = "RENDER_QUEUE_CAPACITY",
                    value = %val,
                    "Invalid queue capacity, keeping unbounded queue"
                ),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_count == 0 {
            return Err(ConfigError::Invalid("thread_count must be > 0".to_string()));
        }

        if timeout_from_secs(self.render_timeout_secs).is_none() {
            return Err(ConfigError::Invalid(format!(
                "render_timeout_secs must be positive and at most {}, got {}",
                MAX_RENDER_TIMEOUT.as_secs(),
                self.render_timeout_secs
            )));
        }

        if self.queue_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "queue_capacity must be > 0 (omit it for an unbounded queue)".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the render timeout as a [`Duration`].
    ///
    /// A value that fails [`validate`](Self::validate) reads as the default.
    pub fn render_timeout(&self) -> Duration {
        timeout_from_secs(self.render_timeout_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS as u64))
    }
}

fn timeout_from_secs(secs: f64) -> Option<Duration> {
    if secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|timeout| *timeout <= MAX_RENDER_TIMEOUT)
}

fn normalize_zoom(zoom: i64) -> u32 {
    u32::try_from(zoom.unsigned_abs()).unwrap_or(u32::MAX)
}

fn deserialize_zoom<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(normalize_zoom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.thread_count, 1);
        assert_eq!(config.max_zoom, 19);
        assert_eq!(config.render_timeout(), Duration::from_secs(60));
        assert!(config.font_path.is_none());
        assert!(!config.strict_styles);
        assert!(config.queue_capacity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DispatchConfig::default();
        config.apply_env(lookup(&[
            ("RENDER_THREAD_COUNT", "4"),
            ("RENDER_MAX_ZOOM", "-12"),
            ("RENDER_TIMEOUT_SECS", "2.5"),
            ("RENDER_FONT_PATH", "/usr/share/fonts"),
            ("RENDER_STRICT_STYLES", "true"),
            ("RENDER_QUEUE_CAPACITY", "32"),
        ]));

        assert_eq!(config.thread_count, 4);
        assert_eq!(config.max_zoom, 12);
        assert_eq!(config.render_timeout(), Duration::from_millis(2500));
        assert_eq!(config.font_path, Some(PathBuf::from("/usr/share/fonts")));
        assert!(config.strict_styles);
        assert_eq!(config.queue_capacity, Some(32));
    }

    #[test]
    fn test_invalid_env_values_keep_defaults() {
        let mut config = DispatchConfig::default();
        config.apply_env(lookup(&[
            ("RENDER_THREAD_COUNT", "many"),
            ("RENDER_MAX_ZOOM", "nineteen"),
            ("RENDER_TIMEOUT_SECS", "-1"),
            ("RENDER_QUEUE_CAPACITY", "lots"),
        ]));

        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.yaml");
        std::fs::write(
            &path,
            "thread_count: 3\nmax_zoom: -18\nrender_timeout_secs: 0.5\nstrict_styles: true\n",
        )
        .unwrap();

        let config = DispatchConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.thread_count, 3);
        assert_eq!(config.max_zoom, 18);
        assert_eq!(config.render_timeout(), Duration::from_millis(500));
        assert!(config.strict_styles);
        // Unspecified keys keep their defaults
        assert!(config.queue_capacity.is_none());
    }

    #[test]
    fn test_yaml_file_errors() {
        let missing = DispatchConfig::from_yaml_file("/nonexistent/render.yaml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "thread_count: [1, 2]\n").unwrap();
        assert!(matches!(
            DispatchConfig::from_yaml_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_thread_count_from_env_ignored() {
        let mut config = DispatchConfig::default();
        config.apply_env(lookup(&[("RENDER_THREAD_COUNT", "0")]));
        assert_eq!(config.thread_count, 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DispatchConfig {
            thread_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatchConfig {
            render_timeout_secs: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatchConfig {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_render_timeout_rejected() {
        for secs in [1e30, 1e19, f64::INFINITY, 0.0] {
            let config = DispatchConfig {
                render_timeout_secs: secs,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted {}",
                secs
            );
            // Never panics, even unvalidated
            assert_eq!(config.render_timeout(), Duration::from_secs(60));
        }

        let mut config = DispatchConfig::default();
        config.apply_env(lookup(&[("RENDER_TIMEOUT_SECS", "1e30")]));
        assert_eq!(config.render_timeout_secs, 60.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_longest_render_timeout_accepted() {
        let config = DispatchConfig {
            render_timeout_secs: MAX_RENDER_TIMEOUT.as_secs_f64(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.render_timeout(), MAX_RENDER_TIMEOUT);
    }
}
