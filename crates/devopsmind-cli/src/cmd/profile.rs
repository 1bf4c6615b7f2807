use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use devopsmind_core::config::Config;
use devopsmind_core::leaderboard;
use devopsmind_core::paths::{self, Layout};
use devopsmind_core::profile::{self, PlayerProfile};
use devopsmind_core::queue::{SyncQueue, SyncRecord};
use tracing::warn;

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Create a profile and make it active
    Create {
        name: String,
        /// Public gamer tag (default: the profile name)
        #[arg(long)]
        gamer: Option<String>,
        /// Email used to restore progress from the global leaderboard
        #[arg(long)]
        email: Option<String>,
    },
    /// Switch to an existing profile
    Login { name: String },
    /// List local profiles
    List,
}

pub fn run(layout: &Layout, subcmd: ProfileSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProfileSubcommand::Create { name, gamer, email } => create(
            layout,
            &name,
            gamer.as_deref().unwrap_or(&name),
            email.as_deref().unwrap_or(""),
            json,
        ),
        ProfileSubcommand::Login { name } => login(layout, &name, json),
        ProfileSubcommand::List => list(layout, json),
    }
}

/// Pull progress recorded under this profile's email from the global board.
/// Returns true when the profile changed and was saved.
fn restore_from_leaderboard(
    layout: &Layout,
    config: &Config,
    name: &str,
    p: &mut PlayerProfile,
) -> anyhow::Result<bool> {
    if p.player.email.trim().is_empty() {
        return Ok(false);
    }
    let board = leaderboard::fetch_global_for(layout, config);
    let Some(entry) = leaderboard::recover_by_email(&board.entries, &p.player.email) else {
        return Ok(false);
    };
    if !leaderboard::apply_recovery(p, entry) {
        return Ok(false);
    }
    p.save(layout, name)
        .with_context(|| format!("failed to save profile '{name}'"))?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

fn create(layout: &Layout, name: &str, gamer: &str, email: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(layout).context("failed to load config")?;
    let mut p = PlayerProfile::create(layout, name, gamer, email)
        .with_context(|| format!("failed to create profile '{name}'"))?;
    let restored = restore_from_leaderboard(layout, &config, name, &mut p)?;
    profile::set_active(layout, name).context("failed to set active profile")?;

    let queued = match SyncQueue::for_layout(layout).enqueue(&SyncRecord::snapshot(&p)) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("failed to queue profile snapshot: {e}");
            None
        }
    };

    if json {
        return print_json(&serde_json::json!({
            "profile": name,
            "gamer": p.player.gamer,
            "xp": p.player.xp,
            "rank": p.player.rank,
            "restored": restored,
            "queued": queued.is_some(),
        }));
    }
    println!("Created profile '{name}' (gamer: {}) and made it active.", p.player.gamer);
    if restored {
        println!(
            "Restored {} XP ({}) and {} completed challenges from the leaderboard.",
            p.player.xp,
            p.player.rank,
            p.progress.completed.len()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// login
// ---------------------------------------------------------------------------

fn login(layout: &Layout, name: &str, json: bool) -> anyhow::Result<()> {
    paths::validate_profile_name(name)?;
    let config = Config::load(layout).context("failed to load config")?;
    let mut p = PlayerProfile::load(layout, name)
        .with_context(|| format!("cannot log in as '{name}'"))?;
    profile::set_active(layout, name).context("failed to set active profile")?;
    let restored = restore_from_leaderboard(layout, &config, name, &mut p)?;

    if json {
        return print_json(&serde_json::json!({
            "profile": name,
            "gamer": p.display_tag(),
            "xp": p.player.xp,
            "rank": p.player.rank,
            "restored": restored,
        }));
    }
    println!(
        "Logged in as '{name}' ({}): {} XP, {}",
        p.display_tag(),
        p.player.xp,
        p.player.rank
    );
    if restored {
        println!("Progress refreshed from the global leaderboard.");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let active = profile::active_name(layout);
    let names = profile::list(layout).context("failed to list profiles")?;
    let mut rows = Vec::new();
    for name in &names {
        match PlayerProfile::load(layout, name) {
            Ok(p) => rows.push((name.clone(), Some(p))),
            Err(e) => {
                warn!("skipping profile '{name}': {e}");
                rows.push((name.clone(), None));
            }
        }
    }

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(name, p)| {
                serde_json::json!({
                    "name": name,
                    "active": *name == active,
                    "gamer": p.as_ref().map(|p| p.display_tag()),
                    "xp": p.as_ref().map(|p| p.player.xp),
                    "rank": p.as_ref().map(|p| p.player.rank.clone()),
                })
            })
            .collect();
        return print_json(&items);
    }

    if rows.is_empty() {
        println!("No profiles yet. Create one with `devopsmind profile create <name>`.");
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|(name, p)| {
            let marker = if *name == active { "*" } else { "" };
            match p {
                Some(p) => vec![
                    marker.to_string(),
                    name.clone(),
                    p.display_tag(),
                    p.player.xp.to_string(),
                    p.player.rank.clone(),
                ],
                None => vec![
                    marker.to_string(),
                    name.clone(),
                    "(unreadable)".to_string(),
                    String::new(),
                    String::new(),
                ],
            }
        })
        .collect();
    print_table(&["", "NAME", "GAMER", "XP", "RANK"], table);
    Ok(())
}
