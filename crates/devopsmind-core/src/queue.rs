//! Offline-first sync queue: one YAML snapshot per file under
//! `.pending_sync/`.
//!
//! File names are `<utc timestamp>_<gamer>_<key12>.yaml`, so a directory
//! listing sorts in creation order and doubles as the dedup index. A file is
//! removed only after the relay acknowledges it.

use crate::error::{DevopsmindError, Result};
use crate::paths::Layout;
use crate::profile::PlayerProfile;
use crate::relay::{email_hash, Ack, Relay, SubmissionMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// SyncRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub gamer: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email_hash: String,
    pub xp: u64,
    pub rank: String,
    #[serde(default)]
    pub completed: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub dedup_key: String,
}

impl SyncRecord {
    /// Snapshot the profile as it is now.
    pub fn snapshot(profile: &PlayerProfile) -> Self {
        let gamer = profile.display_tag();
        let completed: Vec<String> = profile.progress.completed.iter().cloned().collect();
        let dedup_key = dedup_key(&gamer, profile.player.xp, &profile.player.rank, &completed);
        Self {
            username: profile.player.name.clone(),
            email_hash: email_hash(&profile.player.email),
            xp: profile.player.xp,
            rank: profile.player.rank.clone(),
            timestamp: Utc::now(),
            gamer,
            completed,
            dedup_key,
        }
    }

    pub fn meta(&self) -> SubmissionMeta {
        SubmissionMeta {
            gamer: self.gamer.clone(),
            email_hash: self.email_hash.clone(),
        }
    }
}

/// Content hash of a snapshot. Timestamps are excluded, so re-queuing an
/// unchanged profile produces the same key.
pub fn dedup_key(gamer: &str, xp: u64, rank: &str, completed: &[String]) -> String {
    let mut ids: Vec<&str> = completed.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut hasher = Sha256::new();
    hasher.update(gamer.as_bytes());
    hasher.update([0x1f]);
    hasher.update(xp.to_string().as_bytes());
    hasher.update([0x1f]);
    hasher.update(rank.as_bytes());
    hasher.update([0x1f]);
    hasher.update(ids.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

fn safe_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    if cleaned.is_empty() {
        "player".to_string()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(PathBuf),
    /// An identical snapshot is already waiting at this path.
    Duplicate(PathBuf),
}

impl EnqueueOutcome {
    pub fn path(&self) -> &Path {
        match self {
            EnqueueOutcome::Queued(p) | EnqueueOutcome::Duplicate(p) => p,
        }
    }
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub submitted: usize,
    pub acks: Vec<Ack>,
    /// Files left in the queue, with the reason.
    pub kept: Vec<(PathBuf, String)>,
}

// ---------------------------------------------------------------------------
// SyncQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncQueue {
    dir: PathBuf,
}

impl SyncQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_layout(layout: &Layout) -> Self {
        Self::new(layout.pending_sync_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queued files in creation order. A missing directory is an empty queue.
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn load(path: &Path) -> Result<SyncRecord> {
        let malformed = |reason: String| DevopsmindError::MalformedRecord {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        serde_yaml::from_str(&data).map_err(|e| malformed(e.to_string()))
    }

    /// Every readable record. Unreadable files are logged and skipped.
    pub fn records(&self) -> Result<Vec<(PathBuf, SyncRecord)>> {
        let mut out = Vec::new();
        for path in self.pending()? {
            match Self::load(&path) {
                Ok(r) => out.push((path, r)),
                Err(e) => warn!("skipping {e}"),
            }
        }
        Ok(out)
    }

    fn find_duplicate(&self, key: &str) -> Result<Option<PathBuf>> {
        let suffix = format!("_{}.yaml", &key[..12.min(key.len())]);
        for path in self.pending()? {
            let name_matches = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(&suffix));
            if name_matches && Self::load(&path).is_ok_and(|r| r.dedup_key == key) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    pub fn enqueue(&self, record: &SyncRecord) -> Result<EnqueueOutcome> {
        if let Some(existing) = self.find_duplicate(&record.dedup_key)? {
            debug!(path = %existing.display(), "identical snapshot already queued");
            return Ok(EnqueueOutcome::Duplicate(existing));
        }
        let key12 = &record.dedup_key[..12.min(record.dedup_key.len())];
        let name = format!(
            "{}_{}_{}.yaml",
            record.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            safe_component(&record.gamer),
            key12
        );
        let path = self.dir.join(name);
        let data = serde_yaml::to_string(record)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        info!(path = %path.display(), xp = record.xp, "queued progress snapshot");
        Ok(EnqueueOutcome::Queued(path))
    }

    /// Submit every queued record once, in queue order. Acknowledged files
    /// are deleted; everything else stays for the next attempt.
    pub fn drain(&self, relay: &dyn Relay) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        for path in self.pending()? {
            let body = match std::fs::read_to_string(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!("cannot read {}: {e}", path.display());
                    report.kept.push((path, e.to_string()));
                    continue;
                }
            };
            let record: SyncRecord = match serde_yaml::from_str(&body) {
                Ok(r) => r,
                Err(e) => {
                    warn!("malformed sync record {}: {e}", path.display());
                    report.kept.push((path, format!("malformed record: {e}")));
                    continue;
                }
            };

            match relay.submit(&body, &record.meta()) {
                Ok(ack) => {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("acknowledged but could not remove {}: {e}", path.display());
                        report.kept.push((path, format!("acknowledged, not removed: {e}")));
                        continue;
                    }
                    info!(path = %path.display(), "submitted");
                    report.submitted += 1;
                    report.acks.push(ack);
                }
                Err(e) => {
                    warn!("submission of {} failed: {e}", path.display());
                    report.kept.push((path, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
