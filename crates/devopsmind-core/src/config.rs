use crate::error::Result;
use crate::paths::Layout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_RELAY_URL: &str = "https://devopsmind-relay.gauravchile05.workers.dev";

pub const DEFAULT_LEADERBOARD_URLS: &[&str] = &[
    "https://raw.githubusercontent.com/InfraForgeLabs/DevOpsMind/leaderboard/leaderboard.json",
    "https://raw.githubusercontent.com/InfraForgeLabs/DevOpsMind/leaderboard/leaderboard/leaderboard.json",
];

pub const RELAY_URL_ENV: &str = "DEVOPSMIND_WORKER_URL";
pub const LEADERBOARD_URL_ENV: &str = "DEVOPSMIND_LEADERBOARD_URL";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_relay_url")]
    pub relay_url: String,
    #[serde(default = "default_leaderboard_urls")]
    pub leaderboard_urls: Vec<String>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_leaderboard_timeout")]
    pub leaderboard_timeout_secs: u64,
    /// Scanned after the built-in roots, so they override them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_challenge_roots: Vec<PathBuf>,
}

fn default_version() -> u32 {
    1
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.to_string()
}

fn default_leaderboard_urls() -> Vec<String> {
    DEFAULT_LEADERBOARD_URLS.iter().map(|s| s.to_string()).collect()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_leaderboard_timeout() -> u64 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            relay_url: default_relay_url(),
            leaderboard_urls: default_leaderboard_urls(),
            http_timeout_secs: default_http_timeout(),
            leaderboard_timeout_secs: default_leaderboard_timeout(),
            extra_challenge_roots: Vec::new(),
        }
    }
}

impl Config {
    /// Load `config.yaml` from the data dir. A missing file yields defaults.
    /// Environment overrides are applied on top.
    pub fn load(layout: &Layout) -> Result<Self> {
        let mut cfg = Self::load_file(&layout.config_path())?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    #[cfg(test)]
    fn save(&self, layout: &Layout) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&layout.config_path(), data.as_bytes())
    }

    fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(RELAY_URL_ENV) {
            self.relay_url = url;
        }
        if let Some(url) = non_empty_env(LEADERBOARD_URL_ENV) {
            self.leaderboard_urls.retain(|u| *u != url);
            self.leaderboard_urls.insert(0, url);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.relay_url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "relay_url is empty; progress can be queued but never submitted"
                    .to_string(),
            });
        } else if !self.relay_url.starts_with("http://") && !self.relay_url.starts_with("https://") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("relay_url '{}' is not an http(s) URL", self.relay_url),
            });
        }

        if self.leaderboard_urls.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no leaderboard_urls configured".to_string(),
            });
        }

        for (key, value) in [
            ("http_timeout_secs", self.http_timeout_secs),
            ("leaderboard_timeout_secs", self.leaderboard_timeout_secs),
        ] {
            if !(8..=15).contains(&value) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{key}={value} is outside the usual 8-15 second range"),
                });
            }
        }

        for root in &self.extra_challenge_roots {
            if !root.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("extra challenge root {} does not exist", root.display()),
                });
            }
        }

        warnings
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_file(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(cfg.relay_url, DEFAULT_RELAY_URL);
        assert_eq!(cfg.http_timeout_secs, 10);
        assert_eq!(cfg.leaderboard_urls.len(), 2);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "relay_url: http://localhost:9999\n").unwrap();
        let cfg = Config::load_file(&path).unwrap();
        assert_eq!(cfg.relay_url, "http://localhost:9999");
        assert_eq!(cfg.leaderboard_timeout_secs, 8);
        assert!(cfg.extra_challenge_roots.is_empty());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let mut cfg = Config::default();
        cfg.http_timeout_secs = 12;
        cfg.save(&layout).unwrap();
        let loaded = Config::load_file(&layout.config_path()).unwrap();
        assert_eq!(loaded.http_timeout_secs, 12);
    }

    #[test]
    fn empty_roots_not_serialized() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(!yaml.contains("extra_challenge_roots"));
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_relay_and_timeouts() {
        let cfg = Config {
            relay_url: "ftp://nope".to_string(),
            http_timeout_secs: 60,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("not an http(s) URL")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("http_timeout_secs=60")));
    }

    #[test]
    fn validate_flags_missing_extra_root() {
        let cfg = Config {
            extra_challenge_roots: vec![PathBuf::from("/definitely/not/here")],
            ..Config::default()
        };
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("does not exist")));
    }
}
