use anyhow::Context as _;

use crate::output::{JsonEnvelope, print_json};

use super::Ctx;

pub(crate) fn run(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let paths = ctx.paths;

    let created_config = !paths.config_path.exists();
    if created_config {
        ctx.config
            .save(&paths.config_path)
            .context("write patchstack.yaml")?;
    }

    for dir in [&paths.components_dir, &paths.patches_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    tracing::info!(root = %paths.root.display(), created_config, "workspace initialized");

    if ctx.cli.json {
        let envelope = JsonEnvelope::ok(
            "init",
            serde_json::json!({
                "root": paths.root.clone(),
                "config_path": paths.config_path.clone(),
                "created_config": created_config,
                "components_dir": paths.components_dir.clone(),
                "patches_dir": paths.patches_dir.clone(),
            }),
        );
        print_json(&envelope)?;
    } else if created_config {
        println!("Initialized patchstack workspace at {}", paths.root.display());
        println!("- config: {}", paths.config_path.display());
        println!("- components: {}", paths.components_dir.display());
        println!("- patches: {}", paths.patches_dir.display());
    } else {
        println!(
            "Workspace already initialized at {} (kept {})",
            paths.root.display(),
            paths.config_path.display()
        );
    }

    Ok(())
}
