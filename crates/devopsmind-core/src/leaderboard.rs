//! Global and local leaderboards.
//!
//! The global board is a JSON document published by the relay, either
//! `{"players": [...]}` or a bare list. Entries are read leniently: XP comes
//! from `xp` or `score`, the tag from `gamer`, `name` or `username`. The last
//! good download is cached so the board still renders offline.

use crate::config::Config;
use crate::error::Result;
use crate::paths::Layout;
use crate::profile::{self, PlayerProfile};
use crate::relay::email_hash;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub gamer: String,
    pub xp: u64,
    #[serde(default)]
    pub rank: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed: Vec<String>,
}

fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl LeaderboardEntry {
    fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let gamer = ["gamer", "name", "username"]
            .iter()
            .find_map(|k| text(*k).filter(|s| !s.trim().is_empty()))
            .unwrap_or_default();
        let xp = ["xp", "score"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(as_u64))
            .unwrap_or(0);
        let completed = obj
            .get("completed")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            gamer,
            xp,
            rank: text("rank").unwrap_or_default(),
            email_hash: text("email_hash").unwrap_or_default(),
            completed,
        })
    }
}

/// Parse a board document and sort it by XP, highest first.
pub fn parse_board(text: &str) -> std::result::Result<Vec<LeaderboardEntry>, String> {
    let doc: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let players = match &doc {
        Value::Object(map) => map.get("players"),
        other => Some(other),
    };
    let list = players
        .and_then(Value::as_array)
        .ok_or_else(|| "expected a player list".to_string())?;
    let mut entries: Vec<LeaderboardEntry> =
        list.iter().filter_map(LeaderboardEntry::from_value).collect();
    entries.sort_by(|a, b| b.xp.cmp(&a.xp));
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Global board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardSource {
    Remote(String),
    Cache,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct GlobalBoard {
    pub entries: Vec<LeaderboardEntry>,
    pub source: BoardSource,
}

#[derive(Serialize, Deserialize)]
struct CachedBoard {
    players: Vec<LeaderboardEntry>,
}

fn fetch_one(client: &reqwest::blocking::Client, url: &str) -> std::result::Result<Vec<LeaderboardEntry>, String> {
    let resp = client.get(url).send().map_err(|e| e.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    let text = resp.text().map_err(|e| e.to_string())?;
    parse_board(&text)
}

fn load_cache(path: &Path) -> Option<Vec<LeaderboardEntry>> {
    let text = std::fs::read_to_string(path).ok()?;
    match parse_board(&text) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("ignoring unreadable leaderboard cache {}: {e}", path.display());
            None
        }
    }
}

fn save_cache(path: &Path, entries: &[LeaderboardEntry]) -> Result<()> {
    let doc = CachedBoard {
        players: entries.to_vec(),
    };
    let data = serde_json::to_string_pretty(&doc)?;
    crate::io::atomic_write(path, data.as_bytes())
}

/// Try each URL in order; fall back to the cached copy, then to nothing.
pub fn fetch_global(urls: &[String], timeout: Duration, cache_path: &Path) -> GlobalBoard {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("devopsmind/", env!("CARGO_PKG_VERSION")))
        .build();
    match client {
        Ok(client) => {
            for url in urls {
                match fetch_one(&client, url) {
                    Ok(entries) => {
                        if let Err(e) = save_cache(cache_path, &entries) {
                            warn!("could not cache leaderboard: {e}");
                        }
                        return GlobalBoard {
                            entries,
                            source: BoardSource::Remote(url.clone()),
                        };
                    }
                    Err(e) => debug!(url = %url, "leaderboard fetch failed: {e}"),
                }
            }
        }
        Err(e) => warn!("cannot build HTTP client: {e}"),
    }

    match load_cache(cache_path) {
        Some(entries) => GlobalBoard {
            entries,
            source: BoardSource::Cache,
        },
        None => GlobalBoard {
            entries: Vec::new(),
            source: BoardSource::Unavailable,
        },
    }
}

pub fn fetch_global_for(layout: &Layout, config: &Config) -> GlobalBoard {
    fetch_global(
        &config.leaderboard_urls,
        Duration::from_secs(config.leaderboard_timeout_secs),
        &layout.leaderboard_cache_path(),
    )
}

// ---------------------------------------------------------------------------
// Local board and recovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalEntry {
    pub profile: String,
    pub gamer: String,
    pub xp: u64,
    pub rank: String,
    pub completed: usize,
}

/// Every local profile, highest XP first. Unreadable profiles are skipped.
pub fn local_leaderboard(layout: &Layout) -> Result<Vec<LocalEntry>> {
    let mut entries = Vec::new();
    for name in profile::list(layout)? {
        match PlayerProfile::load(layout, &name) {
            Ok(p) => entries.push(LocalEntry {
                gamer: p.display_tag(),
                xp: p.player.xp,
                rank: p.player.rank.clone(),
                completed: p.progress.completed.len(),
                profile: name,
            }),
            Err(e) => warn!("skipping profile '{name}': {e}"),
        }
    }
    entries.sort_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.profile.cmp(&b.profile)));
    Ok(entries)
}

pub fn recover_by_email<'a>(
    entries: &'a [LeaderboardEntry],
    email: &str,
) -> Option<&'a LeaderboardEntry> {
    let hash = email_hash(email);
    if hash.is_empty() {
        return None;
    }
    entries.iter().find(|e| e.email_hash == hash)
}

/// Fold a recovered entry into a profile. XP only rises; completed ids are
/// unioned. Returns true when the profile changed.
pub fn apply_recovery(profile: &mut PlayerProfile, entry: &LeaderboardEntry) -> bool {
    let before = profile.clone();
    profile
        .progress
        .completed
        .extend(entry.completed.iter().cloned());
    profile.raise_xp(entry.xp);
    *profile != before
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
