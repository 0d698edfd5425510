use crate::engine::PatchEngine;
use crate::output::{JsonEnvelope, print_json};
use crate::patch::{RebaseInfo, Resolution};
use crate::rebase::{RebaseHistory, RebaseOutcome, Rebaser};
use crate::repository::PatchRepository;
use crate::user_error::UserError;

use super::Ctx;

pub(crate) fn run_start(ctx: &Ctx<'_>, from: &str, to: &str, apply: bool) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);
    let history = RebaseHistory::new(&stores.workspace, ctx.paths.history_key.clone());
    let rebaser = Rebaser::new(&engine, &history);

    let info = rebaser.start(from, to)?;
    if !info.conflicts.is_empty() {
        if !ctx.cli.json {
            println!(
                "Started rebase {from} -> {to}: {} ({} patch(es))",
                info.status,
                info.patches.len()
            );
        }
        return Err(start_conflicts(&info));
    }

    if apply {
        let outcome = rebaser.apply(from)?;
        return finish_apply(ctx, "rebase", from, &outcome);
    }

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok("rebase", &info))?;
    } else {
        println!(
            "Started rebase {from} -> {to}: {} patch(es) apply cleanly",
            info.patches.len()
        );
        println!("Run `patchstack rebase-apply {from}` to apply them");
    }

    Ok(())
}

pub(crate) fn run_apply(ctx: &Ctx<'_>, rebase_id: &str) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);
    let history = RebaseHistory::new(&stores.workspace, ctx.paths.history_key.clone());

    let outcome = Rebaser::new(&engine, &history).apply(rebase_id)?;
    finish_apply(ctx, "rebase-apply", rebase_id, &outcome)
}

pub(crate) fn run_resolve(
    ctx: &Ctx<'_>,
    rebase_id: &str,
    patch_id: &str,
    resolution: Resolution,
) -> anyhow::Result<()> {
    let stores = ctx.stores();
    let repo = PatchRepository::new(&stores.patches);
    let engine = PatchEngine::new(&repo, &stores.components);
    let history = RebaseHistory::new(&stores.workspace, ctx.paths.history_key.clone());

    let info = Rebaser::new(&engine, &history).resolve(rebase_id, patch_id, resolution)?;

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok("resolve", &info))?;
    } else {
        let unresolved = info
            .conflicts
            .iter()
            .filter(|c| c.resolution.is_none())
            .count();
        println!(
            "Marked conflicts of {patch_id} as {} (rebase {rebase_id} is {}, {unresolved} unresolved)",
            resolution.as_str(),
            info.status
        );
    }

    Ok(())
}

fn finish_apply(
    ctx: &Ctx<'_>,
    command: &str,
    rebase_id: &str,
    outcome: &RebaseOutcome,
) -> anyhow::Result<()> {
    if !outcome.success {
        if !ctx.cli.json {
            print_counts(outcome);
        }
        return Err(apply_conflicts(rebase_id, outcome));
    }

    if ctx.cli.json {
        print_json(&JsonEnvelope::ok(command, outcome))?;
    } else {
        print_counts(outcome);
        for result in outcome.results.iter().filter(|r| r.applied) {
            println!("- {} -> {}", result.patch_id, result.file);
        }
    }

    Ok(())
}

fn print_counts(outcome: &RebaseOutcome) {
    println!(
        "Applied {}, failed {}, skipped {}",
        outcome.applied, outcome.failed, outcome.skipped
    );
}

fn start_conflicts(info: &RebaseInfo) -> anyhow::Error {
    anyhow::Error::new(
        UserError::new(
            "E_REBASE_CONFLICTS",
            format!(
                "rebase {} -> {} found {} conflict(s)",
                info.from_version,
                info.to_version,
                info.conflicts.len()
            ),
        )
        .with_details(serde_json::json!({
            "rebase_id": info.from_version,
            "status": info.status,
            "patches": info.patches.len(),
            "conflicts": info.conflicts,
            "hint": format!(
                "resolve each patch with `patchstack resolve {} <patch-id> keep|apply|manual`, then run `patchstack rebase-apply {}`",
                info.from_version, info.from_version
            ),
        })),
    )
}

fn apply_conflicts(rebase_id: &str, outcome: &RebaseOutcome) -> anyhow::Error {
    anyhow::Error::new(
        UserError::new(
            "E_REBASE_CONFLICTS",
            format!(
                "rebase from {rebase_id} failed: {} patch(es) failed, {} conflict(s)",
                outcome.failed,
                outcome.conflicts.len()
            ),
        )
        .with_details(serde_json::json!({
            "rebase_id": rebase_id,
            "applied": outcome.applied,
            "failed": outcome.failed,
            "skipped": outcome.skipped,
            "conflicts": outcome.conflicts,
            "results": outcome.results,
            "hint": "the rebase is recorded as failed; fix the patches and start a new rebase",
        })),
    )
}
