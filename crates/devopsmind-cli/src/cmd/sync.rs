use crate::output::{plural, print_json};
use crate::root::open_session;
use anyhow::Context;
use devopsmind_core::ledger::{self, MergeReport};
use devopsmind_core::paths::Layout;
use devopsmind_core::queue::SyncQueue;
use devopsmind_core::registry::{Registry, RegistryCache};
use devopsmind_core::store::{self, SourceManifest};

pub fn run(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let mut session = open_session(layout)?;

    // 1. Fold queued snapshots back into the active profile.
    let queue = SyncQueue::for_layout(layout);
    let merge: MergeReport = ledger::merge_pending(
        &mut session.profile,
        &session.active_name,
        &queue,
        layout,
    )
    .context("failed to merge pending progress")?;

    // 2. Install bundled packages into the store.
    let install = match &layout.bundled_dir {
        Some(bundled) if bundled.is_dir() => Some(
            store::install_bundled(bundled, &layout.challenge_store_dir())
                .context("failed to install bundled challenges")?,
        ),
        _ => None,
    };

    // 3 + 4. Source manifest and registry cache from a fresh scan.
    let challenges = Registry::from_layout(layout, &session.config).discover();
    SourceManifest::from_challenges(&challenges)
        .save(layout)
        .context("failed to write source manifest")?;
    RegistryCache::from_challenges(&challenges)
        .save(layout)
        .context("failed to write challenge cache")?;

    if json {
        return print_json(&serde_json::json!({
            "merge": merge,
            "install": install,
            "challenges": challenges.len(),
            "pending": queue.pending()?.len(),
        }));
    }

    if merge.changed {
        println!(
            "Merged {}: XP {} -> {}, {} new",
            plural(merge.records, "pending record"),
            merge.xp_before,
            merge.xp_after,
            plural(merge.added_ids.len(), "completion")
        );
    } else {
        println!("Profile already up to date.");
    }
    match &install {
        Some(r) => {
            println!(
                "Challenges installed: {} new, {} updated, {} unchanged",
                r.new, r.updated, r.unchanged
            );
            for (path, reason) in &r.failures {
                eprintln!("warning: could not install {}: {reason}", path.display());
            }
        }
        None => println!("No bundled challenges found; store left as is."),
    }
    println!("Catalog: {} available.", plural(challenges.len(), "challenge"));
    Ok(())
}
