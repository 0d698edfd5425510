use crate::output::{JsonEnvelope, print_json};
use crate::repository::PatchRepository;

use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let scan = repo.scan()?;
    let patches = &scan.patches;
    let warnings: Vec<String> = scan.broken.iter().map(|b| b.warning()).collect();

    if ctx.cli.json {
        let rows: Vec<serde_json::Value> = patches
            .iter()
            .map(|p| {
                serde_json::json!({
                    "metadata": p.metadata,
                    "targetFile": p.target_file,
                    "patchType": p.patch_type,
                    "changes": p.changes.len(),
                })
            })
            .collect();
        let envelope = JsonEnvelope::ok(
            "list",
            serde_json::json!({
                "count": rows.len(),
                "patches": rows,
                "unreadable": scan.broken,
            }),
        )
        .with_warnings(warnings);
        print_json(&envelope)?;
        return Ok(());
    }

    if patches.is_empty() && warnings.is_empty() {
        println!("No patches in {}", ctx.paths.patches_dir.display());
        return Ok(());
    }

    for patch in patches {
        let meta = &patch.metadata;
        println!(
            "{}  {} {}/{}  ({} change(s), upstream {})",
            meta.id,
            patch.patch_type.as_str(),
            meta.component_name,
            patch.target_file,
            patch.changes.len(),
            if meta.upstream_version.is_empty() {
                "-"
            } else {
                meta.upstream_version.as_str()
            }
        );
        if !meta.description.is_empty() {
            println!("    {}", meta.description);
        }
    }
    for warning in &warnings {
        println!("Warning: {warning}");
    }

    Ok(())
}
