use crate::output::{JsonEnvelope, print_json};
use crate::repository::PatchRepository;

use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>, patch_id: &str) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let patch = PatchRepository::new(&stores.patches).load(patch_id)?;

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok("show", patch))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&patch)?);
    }

    Ok(())
}
