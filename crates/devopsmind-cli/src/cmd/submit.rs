use crate::output::{plural, print_json};
use anyhow::Context;
use devopsmind_core::config::Config;
use devopsmind_core::paths::Layout;
use devopsmind_core::queue::{DrainReport, SyncQueue};
use devopsmind_core::relay::HttpRelay;

/// Submit every queued snapshot once. Failures leave records queued.
pub fn drain(layout: &Layout, config: &Config) -> anyhow::Result<DrainReport> {
    let relay = HttpRelay::from_config(config).context("failed to build relay client")?;
    SyncQueue::for_layout(layout)
        .drain(&relay)
        .context("failed to read sync queue")
}

/// One-line summary for text output, or `None` when nothing was queued.
pub fn summary(report: &DrainReport) -> Option<String> {
    match (report.submitted, report.kept.len()) {
        (0, 0) => None,
        (sent, 0) => Some(format!(
            "Submitted {} to the leaderboard.",
            plural(sent, "snapshot")
        )),
        (sent, kept) => Some(format!(
            "Submitted {}; {} still queued (run `devopsmind submit` when online).",
            plural(sent, "snapshot"),
            kept
        )),
    }
}

pub fn run(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let config = Config::load(layout).context("failed to load config")?;
    let report = drain(layout, &config)?;

    if json {
        let kept: Vec<serde_json::Value> = report
            .kept
            .iter()
            .map(|(path, reason)| {
                serde_json::json!({ "path": path.display().to_string(), "reason": reason })
            })
            .collect();
        let acks: Vec<Option<&str>> = report.acks.iter().map(|a| a.sha256.as_deref()).collect();
        return print_json(&serde_json::json!({
            "relay": config.relay_url,
            "submitted": report.submitted,
            "acks": acks,
            "kept": kept,
        }));
    }

    match summary(&report) {
        Some(line) => println!("{line}"),
        None => println!("Nothing to submit."),
    }
    for (path, reason) in &report.kept {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  kept {name}: {reason}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn summary_lines() {
        assert_eq!(summary(&DrainReport::default()), None);
        let sent = DrainReport {
            submitted: 2,
            ..DrainReport::default()
        };
        assert_eq!(
            summary(&sent).unwrap(),
            "Submitted 2 snapshots to the leaderboard."
        );
        let partial = DrainReport {
            submitted: 0,
            kept: vec![(PathBuf::from("a.yaml"), "relay unreachable".to_string())],
            ..DrainReport::default()
        };
        assert!(summary(&partial).unwrap().contains("1 still queued"));
    }
}
