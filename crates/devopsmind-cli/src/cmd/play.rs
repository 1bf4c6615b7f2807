use crate::output::print_json;
use crate::root::open_session;
use anyhow::Context;
use devopsmind_core::engine::{self, PlayOptions, PlayReport};
use devopsmind_core::ledger::CompletionOutcome;
use devopsmind_core::paths::Layout;
use devopsmind_core::queue::DrainReport;
use devopsmind_core::registry::Registry;
use devopsmind_core::validator::Context as ValidatorContext;
use tracing::warn;

use super::submit;

// ---------------------------------------------------------------------------
// play
// ---------------------------------------------------------------------------

pub fn run(layout: &Layout, id: &str, json: bool) -> anyhow::Result<()> {
    let opts = PlayOptions {
        refresh: true,
        ..PlayOptions::default()
    };
    execute(layout, id, &opts, json)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn validate(layout: &Layout, id: &str, context: Option<&str>, json: bool) -> anyhow::Result<()> {
    let context = match context {
        Some(raw) => serde_json::from_str::<ValidatorContext>(raw)
            .context("--context must be a JSON object")?,
        None => ValidatorContext::new(),
    };
    let opts = PlayOptions {
        context,
        refresh: false,
    };
    execute(layout, id, &opts, json)
}

fn execute(layout: &Layout, id: &str, opts: &PlayOptions, json: bool) -> anyhow::Result<()> {
    let mut session = open_session(layout)?;
    let registry = Registry::from_layout(layout, &session.config);
    let report = engine::play(&mut session, &registry, id, opts)
        .with_context(|| format!("cannot play '{id}'"))?;

    // Newly queued progress goes out right away; failures stay queued.
    let drained = match &report.completion {
        Some(CompletionOutcome::Recorded { queued: Some(_), .. }) => {
            match submit::drain(layout, &session.config) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("could not submit progress: {e:#}");
                    None
                }
            }
        }
        _ => None,
    };

    if json {
        print_report_json(&report, drained.as_ref())
    } else {
        print_report(&report, drained.as_ref());
        Ok(())
    }
}

fn print_report(report: &PlayReport, drained: Option<&DrainReport>) {
    let ch = &report.challenge;
    println!("{} ({}, {} XP)", ch.title, ch.id, ch.xp);
    println!("Workspace: {}", report.workspace.display());
    if let Some(m) = &report.materialized {
        for f in &m.failures {
            eprintln!("warning: could not refresh {}: {}", f.path.display(), f.reason);
        }
    }

    if !report.outcome.success {
        println!("FAIL: {}", report.outcome.message);
        println!("Run \"devopsmind describe {}\" to view requirements.", ch.id);
        return;
    }

    println!("PASS: {}", report.outcome.message);
    match &report.completion {
        Some(CompletionOutcome::Recorded { xp, rank, queued }) => {
            println!("+{} XP. Total: {xp} XP, rank: {rank}", ch.xp);
            if queued.is_none() {
                eprintln!("warning: progress saved locally but could not be queued for the leaderboard");
            }
        }
        Some(CompletionOutcome::AlreadyCompleted) => {
            println!("Already completed; no XP awarded.");
        }
        None => {}
    }
    if let Some(line) = drained.and_then(submit::summary) {
        println!("{line}");
    }
}

fn print_report_json(report: &PlayReport, drained: Option<&DrainReport>) -> anyhow::Result<()> {
    let completion = match &report.completion {
        Some(CompletionOutcome::Recorded { xp, rank, queued }) => serde_json::json!({
            "status": "recorded",
            "xp": xp,
            "rank": rank,
            "queued": queued.as_ref().map(|q| q.path().display().to_string()),
        }),
        Some(CompletionOutcome::AlreadyCompleted) => serde_json::json!({ "status": "already_completed" }),
        None => serde_json::Value::Null,
    };
    print_json(&serde_json::json!({
        "id": report.challenge.id,
        "title": report.challenge.title,
        "workspace": report.workspace.display().to_string(),
        "source": report.source.display().to_string(),
        "materialized": report.materialized,
        "success": report.outcome.success,
        "message": report.outcome.message,
        "completion": completion,
        "submitted": drained.map(|d| d.submitted),
    }))
}
