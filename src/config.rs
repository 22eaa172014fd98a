//! Run settings loaded from an optional YAML file.
//!
//! Every field has a default, so the file may list only what it changes:
//!
//! ```yaml
//! output_dir: ./data
//! http:
//!   user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)"
//!   timeout_secs: 20
//!   concurrency: 10
//!   request_delay_ms: 100
//! ```

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Directory receiving each collection's CSV when `--output` is not given.
    pub output_dir: PathBuf,
    pub http: HttpSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            http: HttpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Worker count for parallel page fetches.
    pub concurrency: usize,
    /// Pause after each request, to stay polite with government servers.
    pub request_delay_ms: u64,
    /// Retries on transport errors and 429/5xx answers.
    pub max_retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            timeout_secs: 20,
            concurrency: 10,
            request_delay_ms: 100,
            max_retries: 3,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load settings from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Where a collection writes: the explicit override, or `output_dir/default_name`.
    pub fn output_path(&self, explicit: Option<&Path>, default_name: &str) -> PathBuf {
        match explicit {
            Some(p) => p.to_path_buf(),
            None => self.output_dir.join(default_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let s = Settings::from_yaml("http:\n  concurrency: 4\n").unwrap();
        assert_eq!(s.http.concurrency, 4);
        assert_eq!(s.http.timeout_secs, 20);
        assert_eq!(s.output_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let s = Settings::from_yaml("{}").unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(Settings::from_yaml("http: [1, 2").is_err());
    }

    #[test]
    fn test_load_without_path_is_default() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_output_path() {
        let s = Settings::default();
        assert_eq!(
            s.output_path(None, "ches.csv"),
            PathBuf::from("data").join("ches.csv")
        );
        assert_eq!(
            s.output_path(Some(Path::new("/tmp/x.csv")), "ches.csv"),
            PathBuf::from("/tmp/x.csv")
        );
    }
}
