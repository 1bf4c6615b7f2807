//! The play loop: find → materialize → validate → record.

use crate::error::{DevopsmindError, Result};
use crate::ledger::{self, CompletionOutcome};
use crate::paths::Layout;
use crate::registry::{Challenge, Registry};
use crate::session::Session;
use crate::store;
use crate::validator::{self, Context, ValidationOutcome};
use crate::workspace::{self, MaterializeReport};
use chrono::Local;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Passed to validators that accept a context.
    pub context: Context,
    /// Refresh challenge-provided files before validating.
    pub refresh: bool,
}

#[derive(Debug)]
pub struct PlayReport {
    pub challenge: Challenge,
    pub workspace: PathBuf,
    /// Directory the workspace was refreshed from.
    pub source: PathBuf,
    pub materialized: Option<MaterializeReport>,
    pub outcome: ValidationOutcome,
    /// Present only when validation succeeded.
    pub completion: Option<CompletionOutcome>,
}

/// Play (or re-validate) one challenge for the session's active profile.
pub fn play(
    session: &mut Session,
    registry: &Registry,
    id: &str,
    opts: &PlayOptions,
) -> Result<PlayReport> {
    let id = id.trim();
    let challenge = match registry.find(id) {
        Ok(c) => c,
        Err(e @ DevopsmindError::ChallengeNotFound(_)) => {
            log_session(&session.layout, id, "Challenge not found.", false, 0);
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let workspace = session.layout.workspace_dir(&challenge.id);
    crate::io::ensure_dir(&workspace)?;

    let source = store::resolve_source(&session.layout, &challenge);
    let materialized = if opts.refresh {
        if source.is_dir() {
            let report = workspace::materialize(&source, &workspace)?;
            info!(
                challenge = %challenge.id,
                copied = report.copied,
                source = %source.display(),
                "workspace refreshed"
            );
            if !report.is_clean() {
                warn!(
                    challenge = %challenge.id,
                    failures = report.failures.len(),
                    "some challenge files could not be refreshed"
                );
            }
            Some(report)
        } else {
            warn!("could not locate files for '{}' in {}", challenge.id, source.display());
            None
        }
    } else {
        None
    };

    let v = validator::load_validator(&challenge.source_path, challenge.validator.as_ref());
    let outcome = validator::run(v.as_ref(), &workspace, &opts.context);

    let awarded = if outcome.success { challenge.xp } else { 0 };
    log_session(
        &session.layout,
        &challenge.id,
        &outcome.message,
        outcome.success,
        awarded,
    );

    let completion = if outcome.success {
        Some(ledger::record_completion(session, &challenge.id, challenge.xp)?)
    } else {
        None
    };

    Ok(PlayReport {
        challenge,
        workspace,
        source,
        materialized,
        outcome,
        completion,
    })
}

/// Format one session log line.
pub fn session_line(timestamp: &str, id: &str, message: &str, success: bool, xp: u32) -> String {
    let status = if success {
        format!("SUCCESS (+{xp} XP)")
    } else {
        "FAIL".to_string()
    };
    format!("[{timestamp}] {id} → {status} — {message}\n")
}

fn log_session(layout: &Layout, id: &str, message: &str, success: bool, xp: u32) {
    let ts = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let line = session_line(&ts, id, message, success, xp);
    if let Err(e) = crate::io::append_text(&layout.session_log_path(), &line) {
        warn!("failed to write session log: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
