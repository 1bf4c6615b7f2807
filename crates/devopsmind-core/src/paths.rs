use crate::error::{DevopsmindError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants (relative to the data dir unless noted)
// ---------------------------------------------------------------------------

pub const DATA_DIR_NAME: &str = ".devopsmind";
pub const XDG_DATA_DIR_NAME: &str = "devopsmind";

pub const PROFILES_DIR: &str = "profiles";
pub const ACTIVE_PROFILE_FILE: &str = "profiles/active.txt";
pub const PENDING_SYNC_DIR: &str = ".pending_sync";
pub const CHALLENGE_STORE_DIR: &str = "challenges";
pub const LEADERBOARD_DIR: &str = "leaderboard";

pub const CONFIG_FILE: &str = "config.yaml";
pub const REGISTRY_CACHE_FILE: &str = "challenges.json";
pub const SOURCE_MANIFEST_FILE: &str = "sources.yaml";
pub const LEADERBOARD_CACHE_FILE: &str = "leaderboard/leaderboard.json";

/// Workspace root, relative to the home directory.
pub const WORKSPACE_HOME_DIR: &str = "DevOpsMind/workspace";
pub const SESSION_LOG_FILE: &str = "logs/session.log";

pub const DEFAULT_PROFILE: &str = "default";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Every on-disk location the engine touches, resolved once per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub data_dir: PathBuf,
    pub workspace_root: PathBuf,
    /// Challenge packages shipped with the binary.
    pub bundled_dir: Option<PathBuf>,
    /// `~/.config/devopsmind/challenges`
    pub config_challenges_dir: Option<PathBuf>,
}

impl Layout {
    /// Resolve the layout.
    ///
    /// Data dir priority: explicit → `$XDG_DATA_HOME/devopsmind` → `~/.devopsmind`.
    /// Workspace priority: explicit → `~/DevOpsMind/workspace` → `<data dir>/workspace`.
    pub fn resolve(data_dir: Option<&Path>, workspace_root: Option<&Path>) -> Result<Self> {
        let home = home::home_dir();

        let data_dir = match data_dir {
            Some(p) => p.to_path_buf(),
            None => match std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
                Some(xdg) => PathBuf::from(xdg).join(XDG_DATA_DIR_NAME),
                None => home
                    .as_ref()
                    .ok_or(DevopsmindError::HomeNotFound)?
                    .join(DATA_DIR_NAME),
            },
        };

        let workspace_root = match (workspace_root, &home) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(h)) => h.join(WORKSPACE_HOME_DIR),
            (None, None) => data_dir.join("workspace"),
        };

        let config_challenges_dir = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(xdg) => Some(PathBuf::from(xdg).join(XDG_DATA_DIR_NAME).join(CHALLENGE_STORE_DIR)),
            None => home
                .as_ref()
                .map(|h| h.join(".config").join(XDG_DATA_DIR_NAME).join(CHALLENGE_STORE_DIR)),
        };

        Ok(Self {
            data_dir,
            workspace_root,
            bundled_dir: bundled_challenges_dir(),
            config_challenges_dir,
        })
    }

    /// A self-contained layout under `root`, with no bundled or config roots.
    pub fn under(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            workspace_root: root.join("workspace"),
            bundled_dir: None,
            config_challenges_dir: None,
        }
    }

    pub fn with_bundled(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join(PROFILES_DIR)
    }

    pub fn active_profile_file(&self) -> PathBuf {
        self.data_dir.join(ACTIVE_PROFILE_FILE)
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir().join(format!("{name}.yaml"))
    }

    pub fn pending_sync_dir(&self) -> PathBuf {
        self.data_dir.join(PENDING_SYNC_DIR)
    }

    pub fn challenge_store_dir(&self) -> PathBuf {
        self.data_dir.join(CHALLENGE_STORE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn registry_cache_path(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_CACHE_FILE)
    }

    pub fn source_manifest_path(&self) -> PathBuf {
        self.data_dir.join(SOURCE_MANIFEST_FILE)
    }

    pub fn leaderboard_cache_path(&self) -> PathBuf {
        self.data_dir.join(LEADERBOARD_CACHE_FILE)
    }

    /// `~/DevOpsMind/logs/session.log` for the default workspace root.
    pub fn session_log_path(&self) -> PathBuf {
        match self.workspace_root.parent() {
            Some(parent) => parent.join(SESSION_LOG_FILE),
            None => self.data_dir.join(SESSION_LOG_FILE),
        }
    }

    pub fn workspace_dir(&self, challenge_id: &str) -> PathBuf {
        self.workspace_root.join(path_component(challenge_id))
    }

    /// Challenge roots in scan precedence order: later roots override earlier
    /// ones when ids collide.
    pub fn challenge_roots(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(b) = &self.bundled_dir {
            roots.push(b.clone());
        }
        roots.push(self.challenge_store_dir());
        if let Some(c) = &self.config_challenges_dir {
            roots.push(c.clone());
        }
        roots.extend(extra.iter().cloned());
        roots
    }
}

/// Locate the challenge packages shipped with the binary.
///
/// `DEVOPSMIND_BUNDLED` → `<exe dir>/challenges` → the source checkout's `challenges/`.
pub fn bundled_challenges_dir() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("DEVOPSMIND_BUNDLED").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(p));
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join(CHALLENGE_STORE_DIR)))
    {
        if dir.is_dir() {
            return Some(dir);
        }
    }
    let checkout = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../challenges");
    checkout.is_dir().then_some(checkout)
}

/// Make an id safe to use as a single path component.
pub fn path_component(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect::<String>()
        .replace("..", "_")
}

// ---------------------------------------------------------------------------
// Profile name validation
// ---------------------------------------------------------------------------

static PROFILE_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn profile_name_re() -> &'static Regex {
    PROFILE_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || name == "active" || !profile_name_re().is_match(name) {
        return Err(DevopsmindError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
