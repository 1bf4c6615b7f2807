//! Environment health checks for `devopsmind doctor`.

use crate::config::{Config, WarnLevel};
use crate::paths::Layout;
use crate::registry::challenge_dirs;
use crate::validator::command::detect_python;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

fn tool_check(name: &str, found: Option<String>, why: &str) -> Check {
    match found {
        Some(path) => Check::new(name, CheckStatus::Ok, path),
        None => Check::new(name, CheckStatus::Warn, format!("not found on PATH ({why})")),
    }
}

pub fn run_checks(layout: &Layout, config: &Config) -> Vec<Check> {
    let mut checks = Vec::new();

    let data_dir = layout.data_dir.display().to_string();
    checks.push(if crate::io::is_writable_dir(&layout.data_dir) {
        Check::new("data directory writable", CheckStatus::Ok, data_dir)
    } else {
        Check::new("data directory writable", CheckStatus::Fail, data_dir)
    });

    checks.push(match &layout.bundled_dir {
        Some(dir) if dir.is_dir() => {
            let count = challenge_dirs(dir).len();
            let status = if count > 0 {
                CheckStatus::Ok
            } else {
                CheckStatus::Warn
            };
            Check::new(
                "bundled challenges",
                status,
                format!("{count} in {}", dir.display()),
            )
        }
        Some(dir) => Check::new(
            "bundled challenges",
            CheckStatus::Warn,
            format!("{} does not exist", dir.display()),
        ),
        None => Check::new(
            "bundled challenges",
            CheckStatus::Warn,
            "no bundled challenge directory found",
        ),
    });

    checks.push(tool_check(
        "git installed",
        which::which("git")
            .ok()
            .map(|p| p.display().to_string()),
        "needed by git challenges",
    ));
    checks.push(tool_check(
        "python installed",
        detect_python().map(str::to_string),
        "needed by python validators",
    ));

    checks.push(if config.relay_url.trim().is_empty() {
        Check::new(
            "relay configured",
            CheckStatus::Fail,
            "relay_url is empty; progress stays queued",
        )
    } else {
        Check::new("relay configured", CheckStatus::Ok, config.relay_url.clone())
    });

    for warning in config.validate() {
        let status = match warning.level {
            WarnLevel::Error => CheckStatus::Fail,
            WarnLevel::Warning => CheckStatus::Warn,
        };
        checks.push(Check::new("config", status, warning.message));
    }

    checks
}

pub fn has_failures(checks: &[Check]) -> bool {
    checks.iter().any(|c| c.status == CheckStatus::Fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn healthy_layout_passes_required_checks() {
        let dir = TempDir::new().unwrap();
        let bundled = dir.path().join("bundled");
        std::fs::create_dir_all(bundled.join("03-git/hard")).unwrap();
        std::fs::write(bundled.join("03-git/hard/challenge.yaml"), "id: g\n").unwrap();
        let layout = Layout::under(dir.path()).with_bundled(&bundled);

        let checks = run_checks(&layout, &Config::default());
        assert!(!has_failures(&checks));
        let bundled_check = checks.iter().find(|c| c.name == "bundled challenges").unwrap();
        assert_eq!(bundled_check.status, CheckStatus::Ok);
        assert!(bundled_check.detail.starts_with("1 in "));
    }

    #[test]
    fn missing_bundle_and_relay_are_reported() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let config = Config {
            relay_url: String::new(),
            ..Config::default()
        };
        let checks = run_checks(&layout, &config);
        assert!(has_failures(&checks));
        assert!(checks
            .iter()
            .any(|c| c.name == "bundled challenges" && c.status == CheckStatus::Warn));
        assert!(checks
            .iter()
            .any(|c| c.name == "relay configured" && c.status == CheckStatus::Fail));
    }
}
