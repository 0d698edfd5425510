use crate::output::{JsonEnvelope, print_json};
use crate::rebase::RebaseHistory;

use super::super::util::print_conflict;
use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let history = RebaseHistory::new(&stores.workspace, ctx.paths.history_key.clone()).load()?;

    if ctx.cli.json {
        let envelope = JsonEnvelope::ok(
            "history",
            serde_json::json!({ "count": history.len(), "rebases": history }),
        );
        print_json(&envelope)?;
        return Ok(());
    }

    if history.is_empty() {
        println!("No rebases recorded");
        return Ok(());
    }

    for info in &history {
        let unresolved = info
            .conflicts
            .iter()
            .filter(|c| c.resolution.is_none())
            .count();
        println!(
            "{} -> {}  {}  {} patch(es), {} conflict(s), {} unresolved",
            info.from_version,
            info.to_version,
            info.status,
            info.patches.len(),
            info.conflicts.len(),
            unresolved
        );
        if !info.status.is_finished() {
            for conflict in info.conflicts.iter().filter(|c| c.resolution.is_none()) {
                print_conflict(conflict);
            }
        }
    }

    Ok(())
}
