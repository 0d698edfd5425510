use crate::output::{JsonEnvelope, print_json};
use crate::repository::PatchRepository;

use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>, patch_id: &str) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    repo.remove(patch_id)?;

    let dependents: Vec<String> = repo
        .list()?
        .into_iter()
        .filter(|m| m.dependencies.iter().any(|d| d == patch_id))
        .map(|m| m.id)
        .collect();
    let warnings: Vec<String> = dependents
        .iter()
        .map(|id| format!("patch {id} depends on removed patch {patch_id}"))
        .collect();
    for warning in &warnings {
        tracing::info!("{warning}");
    }

    if ctx.cli.json {
        let envelope = JsonEnvelope::ok(
            "remove",
            serde_json::json!({ "patch_id": patch_id, "dependents": dependents }),
        )
        .with_warnings(warnings);
        print_json(&envelope)?;
    } else {
        println!("Removed patch {patch_id}");
        for warning in &warnings {
            println!("Warning: {warning}");
        }
    }

    Ok(())
}
