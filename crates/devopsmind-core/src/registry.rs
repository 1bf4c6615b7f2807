//! Challenge discovery.
//!
//! A challenge root contains stack directories (`03-git`, `10-observability`),
//! each holding tier directories (`easy`, `medium`, `hard`). A tier directory
//! is a challenge when it carries `challenge.yaml` or `metadata.json`.
//!
//! Roots are scanned in precedence order and a later root overrides an
//! earlier one when ids collide (compared case-insensitively). Every call
//! re-scans; nothing is cached between calls.

use crate::config::Config;
use crate::error::{DevopsmindError, Result};
use crate::paths::Layout;
use crate::types::{id_key, same_id, Difficulty};
use crate::validator::ValidatorSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const YAML_METADATA: &str = "challenge.yaml";
pub const JSON_METADATA: &str = "metadata.json";

const DEFAULT_HINT: &str = "No hint provided.";

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub xp: u32,
    pub tags: BTreeSet<String>,
    pub source_path: PathBuf,
    pub hint: String,
    /// Name of the stack directory the challenge was found under.
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorSpec>,
}

impl Challenge {
    pub fn matches_id(&self, id: &str) -> bool {
        same_id(&self.id, id)
    }

    pub fn in_stack(&self, stack: &str) -> bool {
        stack_matches(&self.stack, stack)
    }
}

/// `03-git` matches `03-git`, `git` and `GIT`.
pub fn stack_matches(stack: &str, wanted: &str) -> bool {
    let wanted = wanted.trim();
    stack.eq_ignore_ascii_case(wanted) || stack_display_name(stack).eq_ignore_ascii_case(wanted)
}

/// `03-git` → `git`; names without a numeric prefix are returned as-is.
pub fn stack_display_name(stack: &str) -> &str {
    match stack.split_once('-') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => stack,
    }
}

// ---------------------------------------------------------------------------
// Metadata document
// ---------------------------------------------------------------------------

/// On-disk metadata. YAML and JSON encodings share this shape.
#[derive(Debug, Default, Deserialize)]
struct ChallengeMeta {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "diff")]
    difficulty: Option<String>,
    #[serde(default)]
    xp: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    validator: Option<ValidatorSpec>,
}

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Locate the metadata file of a tier directory, preferring YAML.
pub fn metadata_file(dir: &Path) -> Option<PathBuf> {
    [YAML_METADATA, JSON_METADATA]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Parse one challenge directory.
pub fn load_challenge(dir: &Path, stack: &str) -> Result<Challenge> {
    let meta_path = metadata_file(dir).ok_or_else(|| DevopsmindError::MalformedMetadata {
        path: dir.to_path_buf(),
        reason: "no challenge.yaml or metadata.json".to_string(),
    })?;
    let text = std::fs::read_to_string(&meta_path)?;
    let malformed = |reason: String| DevopsmindError::MalformedMetadata {
        path: meta_path.clone(),
        reason,
    };

    let meta: ChallengeMeta = if meta_path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?
    } else if text.trim().is_empty() {
        ChallengeMeta::default()
    } else {
        serde_yaml::from_str(&text).map_err(|e| malformed(e.to_string()))?
    };

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = meta
        .id
        .as_ref()
        .and_then(scalar_to_string)
        .unwrap_or(dir_name);
    let difficulty = meta
        .difficulty
        .as_deref()
        .map(Difficulty::parse_lenient)
        .unwrap_or_default();

    Ok(Challenge {
        title: meta.title.unwrap_or_else(|| id.clone()),
        xp: meta.xp.unwrap_or_else(|| difficulty.default_xp()),
        difficulty,
        tags: meta.tags.into_iter().collect(),
        source_path: dir.to_path_buf(),
        hint: meta
            .hint
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HINT.to_string()),
        stack: stack.to_string(),
        validator: meta.validator,
        id,
    })
}

/// Every `(stack, dir)` under `root` that holds a metadata file, in sorted
/// stack order then tier order.
pub fn challenge_dirs(root: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut stacks: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    stacks.sort();

    let mut found = Vec::new();
    for stack_dir in stacks {
        let stack = stack_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for &tier in Difficulty::all() {
            let dir = stack_dir.join(tier.as_str());
            if metadata_file(&dir).is_some() {
                found.push((stack.clone(), dir));
            }
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Registry {
    roots: Vec<PathBuf>,
}

impl Registry {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_layout(layout: &Layout, config: &Config) -> Self {
        Self::new(layout.challenge_roots(&config.extra_challenge_roots))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scan every root and return the deduplicated catalog sorted by id.
    pub fn discover(&self) -> Vec<Challenge> {
        let mut by_id: BTreeMap<String, Challenge> = BTreeMap::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "challenge root missing, skipping");
                continue;
            }
            for (stack, dir) in challenge_dirs(root) {
                match load_challenge(&dir, &stack) {
                    Ok(ch) => {
                        if let Some(prev) = by_id.insert(id_key(&ch.id), ch) {
                            debug!(id = %prev.id, overridden = %prev.source_path.display(), "challenge overridden by later root");
                        }
                    }
                    Err(e) => warn!("skipping challenge in {}: {e}", dir.display()),
                }
            }
        }
        by_id.into_values().collect()
    }

    pub fn find(&self, id: &str) -> Result<Challenge> {
        self.discover()
            .into_iter()
            .find(|c| c.matches_id(id))
            .ok_or_else(|| DevopsmindError::ChallengeNotFound(id.trim().to_string()))
    }
}

pub fn filter_stack<'a>(challenges: &'a [Challenge], stack: &str) -> Vec<&'a Challenge> {
    challenges.iter().filter(|c| c.in_stack(stack)).collect()
}

// ---------------------------------------------------------------------------
// Registry cache (challenges.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    pub xp: u32,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryCache {
    #[serde(default)]
    pub challenges: Vec<CacheEntry>,
}

impl CacheEntry {
    pub fn in_stack(&self, stack: &str) -> bool {
        stack_matches(&self.category, stack)
    }
}

impl RegistryCache {
    pub fn from_challenges(challenges: &[Challenge]) -> Self {
        Self {
            challenges: challenges
                .iter()
                .map(|c| CacheEntry {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    difficulty: c.difficulty,
                    xp: c.xp,
                    category: c.stack.clone(),
                })
                .collect(),
        }
    }

    /// `Ok(None)` when the cache has never been built.
    pub fn load(layout: &Layout) -> Result<Option<Self>> {
        let path = layout.registry_cache_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, layout: &Layout) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&layout.registry_cache_path(), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn yaml_metadata_with_defaults() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            &root.join("03-git/hard/challenge.yaml"),
            "id: git-hard\ntitle: Squash merge\ndifficulty: Hard\ntags: [git, merge]\n",
        );
        let list = Registry::new(vec![root.to_path_buf()]).discover();
        assert_eq!(list.len(), 1);
        let ch = &list[0];
        assert_eq!(ch.id, "git-hard");
        assert_eq!(ch.difficulty, Difficulty::Hard);
        assert_eq!(ch.xp, 150);
        assert_eq!(ch.stack, "03-git");
        assert_eq!(ch.hint, "No hint provided.");
        assert!(ch.tags.contains("merge"));
    }

    #[test]
    fn json_metadata_with_diff_alias_and_xp_override() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("10-observability/medium/metadata.json"),
            r#"{"id": "obs-medium", "diff": "medium", "xp": 120, "hint": "mean"}"#,
        );
        let list = Registry::new(vec![dir.path().to_path_buf()]).discover();
        assert_eq!(list[0].difficulty, Difficulty::Medium);
        assert_eq!(list[0].xp, 120);
        assert_eq!(list[0].hint, "mean");
        assert_eq!(list[0].title, "obs-medium");
    }

    #[test]
    fn numeric_id_and_missing_id_fallbacks() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a/easy/challenge.yaml"), "id: 42\n");
        write(&dir.path().join("b/medium/challenge.yaml"), "title: Untitled\n");
        let list = Registry::new(vec![dir.path().to_path_buf()]).discover();
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["42", "medium"]);
        assert_eq!(list[1].difficulty, Difficulty::Easy);
        assert_eq!(list[1].xp, 50);
    }

    #[test]
    fn malformed_metadata_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a/easy/challenge.yaml"), "id: [unterminated\n");
        write(&dir.path().join("a/medium/metadata.json"), "{not json");
        write(&dir.path().join("b/hard/challenge.yaml"), "id: ok-one\n");
        let list = Registry::new(vec![dir.path().to_path_buf()]).discover();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "ok-one");
    }

    #[test]
    fn missing_roots_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a/easy/challenge.yaml"), "id: present\n");
        let registry = Registry::new(vec![
            dir.path().join("nope"),
            dir.path().to_path_buf(),
        ]);
        assert_eq!(registry.discover().len(), 1);
    }

    #[test]
    fn later_root_wins_on_collision() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(
            &first.path().join("03-git/easy/challenge.yaml"),
            "id: Git-Easy\ntitle: Old\n",
        );
        write(
            &second.path().join("03-git/easy/challenge.yaml"),
            "id: git-easy\ntitle: New\n",
        );
        let list = Registry::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ])
        .discover();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "New");
        assert_eq!(list[0].source_path, second.path().join("03-git/easy"));
    }

    #[test]
    fn discover_is_sorted_and_deterministic() {
        let dir = TempDir::new().unwrap();
        for (stack, tier, id) in [
            ("z", "easy", "beta"),
            ("a", "hard", "Alpha"),
            ("m", "medium", "gamma"),
        ] {
            write(
                &dir.path().join(stack).join(tier).join("challenge.yaml"),
                &format!("id: {id}\n"),
            );
        }
        let registry = Registry::new(vec![dir.path().to_path_buf()]);
        let first = registry.discover();
        let second = registry.discover();
        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn find_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a/easy/challenge.yaml"), "id: Docker-Easy\n");
        let registry = Registry::new(vec![dir.path().to_path_buf()]);
        assert_eq!(registry.find(" docker-easy ").unwrap().id, "Docker-Easy");
        assert!(matches!(
            registry.find("missing"),
            Err(DevopsmindError::ChallengeNotFound(_))
        ));
    }

    #[test]
    fn non_ascii_ids_dedup_and_find_alike() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(&first.path().join("a/easy/challenge.yaml"), "id: ÉTAPE-1
title: Old
");
        write(&second.path().join("a/easy/challenge.yaml"), "id: étape-1
title: New
");
        let registry = Registry::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(registry.discover().len(), 1);
        assert_eq!(registry.find("ÉTAPE-1").unwrap().title, "New");
    }

    #[test]
    fn non_tier_dirs_ignored() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("a/expert/challenge.yaml"), "id: nope\n");
        write(&dir.path().join("a/challenge.yaml"), "id: nope2\n");
        assert!(Registry::new(vec![dir.path().to_path_buf()]).discover().is_empty());
    }

    #[test]
    fn stack_filter_matches_display_name() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("03-git/easy/challenge.yaml"), "id: g1\n");
        write(&dir.path().join("10-observability/easy/challenge.yaml"), "id: o1\n");
        let list = Registry::new(vec![dir.path().to_path_buf()]).discover();
        assert_eq!(filter_stack(&list, "GIT").len(), 1);
        assert_eq!(filter_stack(&list, "10-observability")[0].id, "o1");
        assert!(filter_stack(&list, "docker").is_empty());
    }

    #[test]
    fn registry_cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        assert!(RegistryCache::load(&layout).unwrap().is_none());

        write(&dir.path().join("roots/03-git/easy/challenge.yaml"), "id: g1\nxp: 70\n");
        let list = Registry::new(vec![dir.path().join("roots")]).discover();
        RegistryCache::from_challenges(&list).save(&layout).unwrap();

        let cache = RegistryCache::load(&layout).unwrap().unwrap();
        assert_eq!(cache.challenges.len(), 1);
        assert_eq!(cache.challenges[0].category, "03-git");
        assert_eq!(cache.challenges[0].xp, 70);
    }

    #[test]
    fn validator_spec_parsed_from_metadata() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("03-git/hard/challenge.yaml"),
            "id: g\nvalidator:\n  builtin: git-squash-merge\n",
        );
        let list = Registry::new(vec![dir.path().to_path_buf()]).discover();
        assert_eq!(
            list[0].validator,
            Some(ValidatorSpec::Builtin("git-squash-merge".to_string()))
        );
    }
}
