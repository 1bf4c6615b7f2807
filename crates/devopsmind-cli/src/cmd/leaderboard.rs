use crate::output::{print_json, print_table};
use crate::root::open_session;
use anyhow::Context;
use devopsmind_core::leaderboard::{self, BoardSource, GlobalBoard};
use devopsmind_core::paths::Layout;

/// Rows shown from the global board.
const GLOBAL_TOP: usize = 15;

fn source_label(board: &GlobalBoard) -> String {
    match &board.source {
        BoardSource::Remote(url) => url.clone(),
        BoardSource::Cache => "cache".to_string(),
        BoardSource::Unavailable => "unavailable".to_string(),
    }
}

pub fn run(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let session = open_session(layout)?;
    let local = leaderboard::local_leaderboard(layout).context("failed to read local profiles")?;
    let global = leaderboard::fetch_global_for(layout, &session.config);
    let top: Vec<_> = global.entries.iter().take(GLOBAL_TOP).collect();

    if json {
        return print_json(&serde_json::json!({
            "player": {
                "profile": session.active_name,
                "gamer": session.profile.display_tag(),
                "xp": session.profile.player.xp,
                "rank": session.profile.player.rank,
            },
            "local": local,
            "global": {
                "source": source_label(&global),
                "entries": top,
            },
        }));
    }

    println!(
        "You: {}  XP: {}  Rank: {}",
        session.profile.display_tag(),
        session.profile.player.xp,
        session.profile.player.rank
    );

    println!();
    println!("Local profiles");
    let rows = local
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let marker = if e.profile == session.active_name { "*" } else { "" };
            vec![
                format!("{}{marker}", i + 1),
                e.profile.clone(),
                e.gamer.clone(),
                e.xp.to_string(),
                e.rank.clone(),
                e.completed.to_string(),
            ]
        })
        .collect();
    print_table(&["#", "PROFILE", "GAMER", "XP", "RANK", "DONE"], rows);

    println!();
    match global.source {
        BoardSource::Unavailable => {
            println!("Global leaderboard unavailable (offline and no cached copy).");
            return Ok(());
        }
        BoardSource::Cache => println!("Global leaderboard (offline, cached copy)"),
        BoardSource::Remote(_) => println!("Global leaderboard"),
    }
    let rows = top
        .iter()
        .enumerate()
        .map(|(i, e)| {
            vec![
                (i + 1).to_string(),
                e.gamer.clone(),
                e.xp.to_string(),
                e.rank.clone(),
            ]
        })
        .collect();
    print_table(&["#", "GAMER", "XP", "RANK"], rows);
    Ok(())
}
