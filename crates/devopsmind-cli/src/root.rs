use anyhow::Context;
use devopsmind_core::paths::Layout;
use devopsmind_core::session::Session;
use std::path::Path;

/// Resolve every on-disk location for this invocation.
///
/// Priority for each root:
/// 1. `--data-dir` / `DEVOPSMIND_HOME` and `--workspace-root` / `DEVOPSMIND_WORKSPACE`
/// 2. XDG and home-directory defaults
pub fn resolve_layout(data_dir: Option<&Path>, workspace_root: Option<&Path>) -> anyhow::Result<Layout> {
    Layout::resolve(data_dir, workspace_root).context("failed to resolve data directory")
}

/// Open the session for the active profile. Prints a one-time setup tip
/// when the profile has no gamer tag or email.
pub fn open_session(layout: &Layout) -> anyhow::Result<Session> {
    let mut session = Session::open(layout.clone()).context("failed to open player session")?;
    if session.rebuilt {
        eprintln!(
            "warning: profile '{}' was unreadable and has been reset",
            session.active_name
        );
    }
    if session.needs_setup() {
        eprintln!(
            "tip: set a gamer tag and email with `devopsmind profile create <name> --gamer <tag> --email <email>`"
        );
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_dirs_win() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let ws = dir.path().join("ws");
        let layout = resolve_layout(Some(data.as_path()), Some(ws.as_path())).unwrap();
        assert_eq!(layout.data_dir, data);
        assert_eq!(layout.workspace_root, ws);
    }

    #[test]
    fn open_session_bootstraps_profile() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let session = open_session(&layout).unwrap();
        assert_eq!(session.active_name, "default");
        assert!(layout.profile_path("default").is_file());
    }
}
