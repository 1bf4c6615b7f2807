//! Player profiles: `profiles/<name>.yaml` plus the `profiles/active.txt`
//! selector.
//!
//! Profiles are never deleted. A corrupted or missing active profile is
//! rebuilt from defaults rather than failing the command.

use crate::error::{DevopsmindError, Result};
use crate::paths::{self, Layout, DEFAULT_PROFILE};
use crate::rank;
use crate::types::same_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gamer: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "default_rank")]
    pub rank: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
}

fn default_rank() -> String {
    rank::rank_for(0).to_string()
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            gamer: String::new(),
            email: String::new(),
            xp: 0,
            rank: default_rank(),
            badges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub progress: Progress,
}

impl PlayerProfile {
    pub fn new(name: &str) -> Self {
        Self {
            player: Player {
                name: name.to_string(),
                ..Player::default()
            },
            progress: Progress::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.player.name
    }

    /// Tag used on the leaderboard: gamer tag, else profile name, else the
    /// local part of the email.
    pub fn display_tag(&self) -> String {
        let p = &self.player;
        [p.gamer.trim(), p.name.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| p.email.split('@').next().unwrap_or_default().to_string())
    }

    pub fn has_completed(&self, id: &str) -> bool {
        self.progress
            .completed
            .iter()
            .any(|c| same_id(c, id))
    }

    /// Raise XP to at least `xp` and recompute the rank. XP never decreases.
    pub fn raise_xp(&mut self, xp: u64) {
        self.player.xp = self.player.xp.max(xp);
        self.refresh_rank();
    }

    pub fn refresh_rank(&mut self) {
        self.player.rank = rank::rank_for(self.player.xp).to_string();
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(layout: &Layout, name: &str) -> Result<Self> {
        let path = layout.profile_path(name);
        if !path.exists() {
            return Err(DevopsmindError::ProfileNotFound(name.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let mut profile: Self = if data.trim().is_empty() {
            Self::new(name)
        } else {
            serde_yaml::from_str(&data)?
        };
        if profile.player.name.is_empty() {
            profile.player.name = name.to_string();
        }
        Ok(profile)
    }

    /// Load `name`, rebuilding it from defaults when missing or corrupted.
    /// The second element is true when a rebuild happened.
    pub fn load_or_rebuild(layout: &Layout, name: &str) -> Result<(Self, bool)> {
        match Self::load(layout, name) {
            Ok(p) => Ok((p, false)),
            Err(DevopsmindError::ProfileNotFound(_)) => {
                let profile = Self::new(name);
                profile.save(layout, name)?;
                info!(profile = name, "created profile");
                Ok((profile, false))
            }
            Err(e) if is_corruption(&e) => {
                warn!("profile '{name}' is corrupted ({e}); restoring defaults");
                let profile = Self::new(name);
                profile.save(layout, name)?;
                Ok((profile, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Write to `profiles/<name>.yaml`. The file name is the profile key;
    /// `player.name` is display data and may differ in legacy files.
    pub fn save(&self, layout: &Layout, name: &str) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&layout.profile_path(name), data.as_bytes())
    }

    pub fn exists(layout: &Layout, name: &str) -> bool {
        layout.profile_path(name).is_file()
    }

    /// Create a new profile file. Fails when one already exists.
    pub fn create(layout: &Layout, name: &str, gamer: &str, email: &str) -> Result<Self> {
        paths::validate_profile_name(name)?;
        if Self::exists(layout, name) {
            return Err(DevopsmindError::ProfileExists(name.to_string()));
        }
        let mut profile = Self::new(name);
        profile.player.gamer = gamer.trim().to_string();
        profile.player.email = email.trim().to_string();
        profile.save(layout, name)?;
        info!(profile = name, "profile created");
        Ok(profile)
    }
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

/// Profile names on disk, sorted.
pub fn list(layout: &Layout) -> Result<Vec<String>> {
    let dir = layout.profiles_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}

/// Name recorded in `active.txt`, or the default profile.
pub fn active_name(layout: &Layout) -> String {
    std::fs::read_to_string(layout.active_profile_file())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| paths::validate_profile_name(s).is_ok())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

pub fn set_active(layout: &Layout, name: &str) -> Result<()> {
    paths::validate_profile_name(name)?;
    crate::io::atomic_write(&layout.active_profile_file(), name.as_bytes())
}

/// Content that cannot be decoded as a profile, as opposed to a file that
/// cannot be reached at all.
fn is_corruption(e: &DevopsmindError) -> bool {
    match e {
        DevopsmindError::Yaml(_) => true,
        DevopsmindError::Io(io) => io.kind() == std::io::ErrorKind::InvalidData,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
