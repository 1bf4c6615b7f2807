//! The challenge store: the user-data copy of challenge packages kept by
//! `sync`, plus the source manifest that says where each challenge's
//! canonical files live.

use crate::error::Result;
use crate::paths::Layout;
use crate::registry::Challenge;
use crate::types::{id_key, same_id};
use crate::workspace::{is_skipped_dir, provided_files};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Install bundled packages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failures: Vec<(PathBuf, String)>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Copy bundled challenge files into the store. A file is copied when it is
/// missing from the store or the bundled copy is newer.
pub fn install_bundled(bundled: &Path, store: &Path) -> Result<InstallReport> {
    let mut report = InstallReport::default();
    if !bundled.is_dir() {
        debug!(bundled = %bundled.display(), "no bundled challenges to install");
        return Ok(report);
    }
    crate::io::ensure_dir(store)?;

    for rel in provided_files(bundled) {
        let from = bundled.join(&rel);
        let to = store.join(&rel);
        let is_new = !to.exists();
        if !is_new {
            match (modified(&from), modified(&to)) {
                (Some(src), Some(dst)) if src <= dst => {
                    report.unchanged += 1;
                    continue;
                }
                _ => {}
            }
        }
        let copied = to
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::copy(&from, &to).map(|_| ()));
        match copied {
            Ok(()) if is_new => report.new += 1,
            Ok(()) => report.updated += 1,
            Err(e) => {
                warn!("failed to install {}: {e}", from.display());
                report.failures.push((rel, e.to_string()));
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Source manifest (sources.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceManifest {
    #[serde(default)]
    pub sources: BTreeMap<String, PathBuf>,
}

impl SourceManifest {
    pub fn from_challenges(challenges: &[Challenge]) -> Self {
        Self {
            sources: challenges
                .iter()
                .map(|c| (c.id.clone(), c.source_path.clone()))
                .collect(),
        }
    }

    /// A missing file is an empty manifest.
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.source_manifest_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, layout: &Layout) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&layout.source_manifest_path(), data.as_bytes())
    }

    pub fn get(&self, id: &str) -> Option<&Path> {
        self.sources
            .iter()
            .find(|(k, _)| same_id(k, id))
            .map(|(_, v)| v.as_path())
    }
}

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

fn store_dirs(store: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(store)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.file_type().is_dir() && !is_skipped_dir(&e.file_name().to_string_lossy())
        })
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Find the directory holding the challenge's canonical files.
///
/// Manifest entry → store dir named after the id → store tier dir whose
/// stack suffix prefixes the id → the path the registry recorded.
pub fn resolve_source(layout: &Layout, challenge: &Challenge) -> PathBuf {
    match SourceManifest::load(layout) {
        Ok(manifest) => {
            if let Some(path) = manifest.get(&challenge.id).filter(|p| p.is_dir()) {
                debug!(id = %challenge.id, path = %path.display(), "source from manifest");
                return path.to_path_buf();
            }
        }
        Err(e) => warn!("ignoring unreadable source manifest: {e}"),
    }

    let store = layout.challenge_store_dir();
    if store.is_dir() {
        let id = id_key(&challenge.id);
        if let Some(dir) = store_dirs(&store).find(|d| id_key(&dir_name(d)) == id) {
            debug!(id = %challenge.id, path = %dir.display(), "source by id match");
            return dir;
        }

        let tier = challenge.difficulty.as_str();
        let by_tier = store_dirs(&store).find(|d| {
            dir_name(d) == tier
                && d.parent().is_some_and(|parent| {
                    let stack = dir_name(parent).to_lowercase();
                    let suffix = stack.rsplit('-').next().unwrap_or_default();
                    !suffix.is_empty() && id.starts_with(suffix)
                })
        });
        if let Some(dir) = by_tier {
            debug!(id = %challenge.id, path = %dir.display(), "source by tier match");
            return dir;
        }
    }

    challenge.source_path.clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn challenge(id: &str, difficulty: Difficulty, source: &Path) -> Challenge {
        Challenge {
            id: id.to_string(),
            title: id.to_string(),
            difficulty,
            xp: difficulty.default_xp(),
            tags: BTreeSet::new(),
            source_path: source.to_path_buf(),
            hint: String::new(),
            stack: String::new(),
            validator: None,
        }
    }

    #[test]
    fn install_counts_new_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let bundled = dir.path().join("bundled");
        let store = dir.path().join("store");
        write(&bundled.join("03-git/hard/challenge.yaml"), "id: g\n");
        write(&bundled.join("03-git/hard/description.md"), "# g\n");
        write(&bundled.join("03-git/hard/__pycache__/x.pyc"), "x");

        let first = install_bundled(&bundled, &store).unwrap();
        assert_eq!(first.new, 2);
        assert_eq!(first.updated, 0);
        assert!(!store.join("03-git/hard/__pycache__").exists());

        let second = install_bundled(&bundled, &store).unwrap();
        assert_eq!(second.new, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn install_updates_when_bundled_is_newer() {
        let dir = TempDir::new().unwrap();
        let bundled = dir.path().join("bundled");
        let store = dir.path().join("store");
        write(&bundled.join("s/easy/app.log"), "new\n");
        write(&store.join("s/easy/app.log"), "old\n");
        let old = std::fs::File::options()
            .write(true)
            .open(store.join("s/easy/app.log"))
            .unwrap();
        old.set_modified(SystemTime::UNIX_EPOCH).unwrap();

        let report = install_bundled(&bundled, &store).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(
            std::fs::read_to_string(store.join("s/easy/app.log")).unwrap(),
            "new\n"
        );
    }

    #[test]
    fn install_without_bundled_is_noop() {
        let dir = TempDir::new().unwrap();
        let report = install_bundled(&dir.path().join("nope"), &dir.path().join("store")).unwrap();
        assert_eq!(report, InstallReport::default());
    }

    #[test]
    fn manifest_entry_wins() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let canonical = dir.path().join("canonical");
        std::fs::create_dir_all(&canonical).unwrap();
        std::fs::create_dir_all(layout.challenge_store_dir().join("obs-easy")).unwrap();

        let mut manifest = SourceManifest::default();
        manifest.sources.insert("Obs-Easy".to_string(), canonical.clone());
        manifest.save(&layout).unwrap();

        let ch = challenge("obs-easy", Difficulty::Easy, Path::new("/registry"));
        assert_eq!(resolve_source(&layout, &ch), canonical);
    }

    #[test]
    fn stale_manifest_entry_falls_through() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let mut manifest = SourceManifest::default();
        manifest
            .sources
            .insert("obs-easy".to_string(), dir.path().join("gone"));
        manifest.save(&layout).unwrap();

        let ch = challenge("obs-easy", Difficulty::Easy, Path::new("/registry"));
        assert_eq!(resolve_source(&layout, &ch), PathBuf::from("/registry"));
    }

    #[test]
    fn id_named_dir_then_tier_heuristic() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let store = layout.challenge_store_dir();
        std::fs::create_dir_all(store.join("10-observability/hard")).unwrap();
        std::fs::create_dir_all(store.join("extra/Git-Rebase")).unwrap();

        let named = challenge("git-rebase", Difficulty::Medium, Path::new("/registry"));
        assert_eq!(resolve_source(&layout, &named), store.join("extra/Git-Rebase"));

        let tiered = challenge("observability-hard", Difficulty::Hard, Path::new("/registry"));
        assert_eq!(
            resolve_source(&layout, &tiered),
            store.join("10-observability/hard")
        );

        let unknown = challenge("terraform-easy", Difficulty::Easy, Path::new("/registry"));
        assert_eq!(resolve_source(&layout, &unknown), PathBuf::from("/registry"));
    }

    #[test]
    fn manifest_roundtrip_and_case_insensitive_get() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        assert_eq!(SourceManifest::load(&layout).unwrap(), SourceManifest::default());

        let ch = challenge("Git-Hard", Difficulty::Hard, Path::new("/s/03-git/hard"));
        SourceManifest::from_challenges(&[ch]).save(&layout).unwrap();
        let loaded = SourceManifest::load(&layout).unwrap();
        assert_eq!(loaded.get("git-hard"), Some(Path::new("/s/03-git/hard")));
    }
}
