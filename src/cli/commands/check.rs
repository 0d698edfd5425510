use crate::engine::PatchEngine;
use crate::output::{JsonEnvelope, print_json};
use crate::repository::PatchRepository;

use super::super::util::check_failure;
use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>, patch_id: &str) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);

    let check = engine.check(patch_id)?;
    if !check.can_apply {
        return Err(check_failure(&check));
    }

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok("check", check))?;
    } else {
        println!("OK {}: applies cleanly to {}", check.patch_id, check.file);
    }

    Ok(())
}
