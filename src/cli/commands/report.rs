use crate::engine::PatchEngine;
use crate::output::{JsonEnvelope, print_json};
use crate::rebase::{RebaseHistory, Rebaser};
use crate::repository::PatchRepository;

use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);
    let history = RebaseHistory::new(&stores.workspace, ctx.paths.history_key.clone());
    let report = Rebaser::new(&engine, &history).report()?;

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok(
            "report",
            serde_json::json!({ "report": report }),
        ))?;
    } else {
        print!("{report}");
        if !report.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
