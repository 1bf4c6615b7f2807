use crate::output::print_json;
use crate::root::open_session;
use devopsmind_core::ledger;
use devopsmind_core::paths::Layout;
use devopsmind_core::queue::SyncQueue;

pub fn run(layout: &Layout, json: bool) -> anyhow::Result<()> {
    let session = open_session(layout)?;
    let stats = ledger::stats(&session.profile);
    let pending = SyncQueue::for_layout(layout).pending()?.len();

    if json {
        return print_json(&serde_json::json!({
            "profile": session.active_name,
            "gamer": session.profile.display_tag(),
            "xp": stats.xp,
            "rank": stats.rank,
            "completed_count": stats.completed_count,
            "completed": stats.completed_ids,
            "badges": stats.badges,
            "pending_sync": pending,
        }));
    }

    println!("Player:    {} ({})", session.profile.display_tag(), session.active_name);
    println!("XP:        {}", stats.xp);
    println!("Rank:      {}", stats.rank);
    println!("Completed: {}", stats.completed_count);
    for id in &stats.completed_ids {
        println!("  - {id}");
    }
    if !stats.badges.is_empty() {
        println!("Badges:    {}", stats.badges.join(", "));
    }
    if pending > 0 {
        println!("Pending sync: {pending} (run `devopsmind submit`)");
    }
    Ok(())
}
