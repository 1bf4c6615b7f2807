use crate::output::{print_json, print_table};
use crate::root::open_session;
use anyhow::Context;
use devopsmind_core::paths::Layout;
use devopsmind_core::registry::{stack_display_name, CacheEntry, Registry, RegistryCache};
use tracing::warn;

pub fn run(layout: &Layout, stack: Option<&str>, json: bool) -> anyhow::Result<()> {
    let session = open_session(layout)?;

    let cached = match RegistryCache::load(layout) {
        Ok(c) => c,
        Err(e) => {
            warn!("ignoring unreadable challenge cache: {e}");
            None
        }
    };
    let from_cache = cached.is_some();
    let catalog = match cached {
        Some(cache) => cache,
        None => RegistryCache::from_challenges(
            &Registry::from_layout(layout, &session.config).discover(),
        ),
    };

    let entries: Vec<&CacheEntry> = catalog
        .challenges
        .iter()
        .filter(|c| stack.map_or(true, |s| c.in_stack(s)))
        .collect();

    if json {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "title": c.title,
                    "difficulty": c.difficulty,
                    "xp": c.xp,
                    "stack": c.category,
                    "completed": session.profile.has_completed(&c.id),
                })
            })
            .collect();
        return print_json(&items).context("failed to print challenge list");
    }

    if !from_cache {
        eprintln!("note: challenge cache not built yet; run `devopsmind sync` to speed this up");
    }
    if entries.is_empty() {
        match stack {
            Some(s) => println!("No challenges found in stack '{s}'."),
            None => println!("No challenges found. Run `devopsmind sync` to install them."),
        }
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.title.clone(),
                stack_display_name(&c.category).to_string(),
                c.difficulty.to_string(),
                c.xp.to_string(),
                if session.profile.has_completed(&c.id) {
                    "yes".to_string()
                } else {
                    String::new()
                },
            ]
        })
        .collect();
    print_table(&["ID", "TITLE", "STACK", "DIFFICULTY", "XP", "DONE"], rows);
    Ok(())
}
