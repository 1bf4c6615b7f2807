//! Progress ledger: XP awards, stats and the bulk merge of queued snapshots.
//!
//! XP for a challenge id is awarded at most once per profile. Every award is
//! followed by a queued snapshot for the leaderboard.

use crate::error::Result;
use crate::paths::Layout;
use crate::profile::PlayerProfile;
use crate::queue::{EnqueueOutcome, SyncQueue, SyncRecord};
use crate::session::Session;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Recorded {
        xp: u64,
        rank: String,
        /// `None` when the snapshot could not be written; the award stands.
        queued: Option<EnqueueOutcome>,
    },
    AlreadyCompleted,
}

/// Award `xp` for `id` unless the active profile already completed it.
pub fn record_completion(session: &mut Session, id: &str, xp: u32) -> Result<CompletionOutcome> {
    let id = id.trim();
    if session.profile.has_completed(id) {
        info!(challenge = id, "already completed, no XP awarded");
        return Ok(CompletionOutcome::AlreadyCompleted);
    }

    let profile = &mut session.profile;
    profile.progress.completed.insert(id.to_string());
    profile.player.xp += u64::from(xp);
    profile.refresh_rank();
    session.save_profile()?;
    info!(
        challenge = id,
        xp = session.profile.player.xp,
        "recorded completion (+{xp} XP)"
    );

    let queue = SyncQueue::for_layout(&session.layout);
    let queued = match queue.enqueue(&SyncRecord::snapshot(&session.profile)) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("failed to queue progress snapshot: {e}");
            None
        }
    };

    Ok(CompletionOutcome::Recorded {
        xp: session.profile.player.xp,
        rank: session.profile.player.rank.clone(),
        queued,
    })
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub xp: u64,
    pub rank: String,
    pub completed_count: usize,
    pub completed_ids: Vec<String>,
    pub badges: Vec<String>,
}

pub fn stats(profile: &PlayerProfile) -> Stats {
    Stats {
        xp: profile.player.xp,
        rank: profile.player.rank.clone(),
        completed_count: profile.progress.completed.len(),
        completed_ids: profile.progress.completed.iter().cloned().collect(),
        badges: profile.player.badges.clone(),
    }
}

// ---------------------------------------------------------------------------
// Bulk merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Queued snapshots belonging to this profile.
    pub records: usize,
    pub added_ids: Vec<String>,
    pub xp_before: u64,
    pub xp_after: u64,
    pub changed: bool,
}

/// Fold queued snapshots for this profile's gamer tag back into it.
///
/// Snapshots are cumulative, so XP is raised to the largest snapshot value
/// rather than summed. Records stay queued for submission. The profile is
/// saved under `name` when anything changed.
pub fn merge_pending(
    profile: &mut PlayerProfile,
    name: &str,
    queue: &SyncQueue,
    layout: &Layout,
) -> Result<MergeReport> {
    let tag = profile.display_tag();
    let mut report = MergeReport {
        xp_before: profile.player.xp,
        xp_after: profile.player.xp,
        ..MergeReport::default()
    };

    for (_, record) in queue.records()? {
        if record.gamer != tag {
            continue;
        }
        report.records += 1;
        for id in &record.completed {
            if !profile.has_completed(id) {
                profile.progress.completed.insert(id.clone());
                report.added_ids.push(id.clone());
            }
        }
        profile.player.xp = profile.player.xp.max(record.xp);
    }

    let old_rank = profile.player.rank.clone();
    profile.refresh_rank();
    report.xp_after = profile.player.xp;
    report.changed = !report.added_ids.is_empty()
        || report.xp_after != report.xp_before
        || profile.player.rank != old_rank;

    if report.changed {
        profile.save(layout, name)?;
        info!(
            records = report.records,
            xp = report.xp_after,
            "merged pending progress"
        );
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        Session::with_config(Layout::under(dir.path()), Config::default()).unwrap()
    }

    #[test]
    fn first_completion_awards_xp_and_queues() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let outcome = record_completion(&mut s, "git-hard", 150).unwrap();
        match outcome {
            CompletionOutcome::Recorded { xp, rank, queued } => {
                assert_eq!(xp, 150);
                assert_eq!(rank, "Beginner");
                assert!(matches!(queued, Some(EnqueueOutcome::Queued(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
        let reloaded = PlayerProfile::load(&s.layout, "default").unwrap();
        assert_eq!(reloaded.player.xp, 150);
        assert!(reloaded.has_completed("git-hard"));
    }

    #[test]
    fn repeat_completion_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        record_completion(&mut s, "obs-easy", 50).unwrap();
        let again = record_completion(&mut s, "OBS-EASY", 50).unwrap();
        assert_eq!(again, CompletionOutcome::AlreadyCompleted);
        assert_eq!(s.profile.player.xp, 50);
        assert_eq!(SyncQueue::for_layout(&s.layout).pending().unwrap().len(), 1);
    }

    #[test]
    fn rank_follows_canonical_bands() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        record_completion(&mut s, "a", 150).unwrap();
        record_completion(&mut s, "b", 100).unwrap();
        assert_eq!(s.profile.player.rank, "Automation Apprentice");
    }

    #[test]
    fn stats_projection() {
        let mut p = PlayerProfile::new("x");
        p.progress.completed.insert("b".to_string());
        p.progress.completed.insert("a".to_string());
        p.player.xp = 100;
        let st = stats(&p);
        assert_eq!(st.completed_count, 2);
        assert_eq!(st.completed_ids, vec!["a", "b"]);
        assert_eq!(st.xp, 100);
    }

    #[test]
    fn merge_takes_max_xp_and_unions_ids() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let queue = SyncQueue::for_layout(&layout);

        let mut snapshot = PlayerProfile::new("default");
        snapshot.player.gamer = "opsy".to_string();
        for (id, xp) in [("a", 100), ("b", 250)] {
            snapshot.progress.completed.insert(id.to_string());
            snapshot.raise_xp(xp);
            queue.enqueue(&SyncRecord::snapshot(&snapshot)).unwrap();
        }
        let mut stranger = PlayerProfile::new("other");
        stranger.player.gamer = "someone-else".to_string();
        stranger.raise_xp(5000);
        queue.enqueue(&SyncRecord::snapshot(&stranger)).unwrap();

        let mut local = PlayerProfile::new("default");
        local.player.gamer = "opsy".to_string();
        local.raise_xp(100);
        local.progress.completed.insert("a".to_string());

        let report = merge_pending(&mut local, "default", &queue, &layout).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.added_ids, vec!["b"]);
        assert_eq!(local.player.xp, 250);
        assert_eq!(local.player.rank, "Automation Apprentice");
        assert!(report.changed);
        assert_eq!(queue.pending().unwrap().len(), 3);

        let again = merge_pending(&mut local, "default", &queue, &layout).unwrap();
        assert!(!again.changed);
        assert_eq!(local.player.xp, 250);
    }

    #[test]
    fn merge_normalizes_legacy_rank() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::under(dir.path());
        let queue = SyncQueue::for_layout(&layout);
        let mut p = PlayerProfile::new("default");
        p.player.xp = 600;
        p.player.rank = "Explorer".to_string();
        let report = merge_pending(&mut p, "default", &queue, &layout).unwrap();
        assert!(report.changed);
        assert_eq!(p.player.rank, "Container Specialist");
    }
}
