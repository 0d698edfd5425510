use crate::engine::PatchEngine;
use crate::output::{JsonEnvelope, print_json};
use crate::repository::PatchRepository;

use super::super::util::{result_failure, short_sha};
use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>, patch_id: &str) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);

    let result = engine.apply(patch_id)?;
    if !result.success {
        return Err(result_failure(&result));
    }

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok("apply", result))?;
    } else {
        println!(
            "Applied {} to {} ({} -> {})",
            result.patch_id,
            result.file,
            short_sha(result.before_sha256.as_deref()),
            short_sha(result.after_sha256.as_deref())
        );
    }

    Ok(())
}
