use std::path::Path;

use anyhow::Context as _;

use crate::engine::PatchEngine;
use crate::output::{JsonEnvelope, print_json};
use crate::patch::{CreatePatchOptions, PatchType, create_patch, now_epoch_ms};
use crate::repository::PatchRepository;
use crate::storage::Storage as _;
use crate::user_error::UserError;

use super::super::util::result_failure;
use super::Ctx;

pub(crate) struct CreateArgs<'a> {
    pub(crate) component: &'a str,
    pub(crate) target: &'a str,
    pub(crate) from: Option<&'a Path>,
    pub(crate) to: Option<&'a Path>,
    pub(crate) id: Option<&'a str>,
    pub(crate) patch_type: PatchType,
    pub(crate) upstream_version: &'a str,
    pub(crate) fragment_version: &'a str,
    pub(crate) description: &'a str,
    pub(crate) author: &'a str,
    pub(crate) reason: &'a str,
    pub(crate) depends_on: &'a [String],
    pub(crate) context_lines: Option<usize>,
    pub(crate) apply: bool,
}

pub(crate) fn run(ctx: &Ctx<'_>, args: &CreateArgs<'_>) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);

    for dep in args.depends_on {
        if !repo.exists(dep)? {
            return Err(UserError::patch_not_found(dep));
        }
    }

    let upstream = match args.from {
        Some(path) => read_text(path)?,
        None => match stores.components.read(args.target)? {
            Some(bytes) => String::from_utf8(bytes)
                .with_context(|| format!("{} is not valid UTF-8", args.target))?,
            None => String::new(),
        },
    };
    let modified = match args.to {
        Some(path) => read_text(path)?,
        None => String::new(),
    };

    let patch = create_patch(
        &upstream,
        &modified,
        CreatePatchOptions {
            id: args.id.map(str::to_string),
            component_name: args.component.to_string(),
            target_file: args.target.to_string(),
            patch_type: args.patch_type,
            upstream_version: args.upstream_version.to_string(),
            fragment_version: args.fragment_version.to_string(),
            description: args.description.to_string(),
            author: args.author.to_string(),
            reason: args.reason.to_string(),
            dependencies: args.depends_on.to_vec(),
            context_lines: args.context_lines.unwrap_or(ctx.config.context_lines),
            now_ms: now_epoch_ms(),
        },
    );

    if patch.patch_type == PatchType::Modify && patch.changes.is_empty() {
        return Err(anyhow::Error::new(
            UserError::new(
                "E_PATCH_EMPTY",
                format!("no differences found for {}", args.target),
            )
            .with_details(serde_json::json!({
                "target_file": args.target,
                "hint": "pass the modified revision with --to",
            })),
        ));
    }

    repo.insert(&patch)?;
    tracing::info!(
        patch_id = patch.id(),
        target = %patch.target_file,
        changes = patch.changes.len(),
        "patch created"
    );

    let applied = if args.apply {
        let engine = PatchEngine::new(&repo, &stores.components);
        let result = engine.apply_patch(&patch);
        if !result.success {
            return Err(result_failure(&result).context(format!(
                "patch {} was saved but not applied",
                patch.id()
            )));
        }
        Some(result)
    } else {
        None
    };

    if ctx.cli.json {
        let envelope = JsonEnvelope::ok(
            "create",
            serde_json::json!({
                "patch": patch,
                "applied": applied,
            }),
        );
        print_json(&envelope)?;
    } else {
        println!(
            "Created patch {} ({} change(s) to {}/{})",
            patch.id(),
            patch.changes.len(),
            patch.metadata.component_name,
            patch.target_file
        );
        if applied.is_some() {
            println!("Applied to {}", stores.components.describe(&patch.target_file));
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
