use crate::hash::short_digest;
use crate::patch::{Conflict, PatchCheck, PatchResult};
use crate::user_error::UserError;

/// Error for a patch that did not apply (or would not apply) cleanly.
///
/// Conflicts map to `E_PATCH_CONFLICT`; anything else (missing target, write failure) maps to
/// `E_PATCH_APPLY_FAILED`.
pub(crate) fn patch_failure(
    patch_id: &str,
    file: &str,
    conflicts: &[Conflict],
    error: Option<&str>,
) -> anyhow::Error {
    let (code, message) = if conflicts.is_empty() {
        (
            "E_PATCH_APPLY_FAILED",
            format!(
                "patch {patch_id} cannot be applied to {file}: {}",
                error.unwrap_or("unknown error")
            ),
        )
    } else {
        (
            "E_PATCH_CONFLICT",
            format!(
                "patch {patch_id} conflicts with {file} ({} conflict(s))",
                conflicts.len()
            ),
        )
    };

    anyhow::Error::new(UserError::new(code, message).with_details(serde_json::json!({
        "patch_id": patch_id,
        "file": file,
        "conflicts": conflicts,
        "error": error,
        "hint": "the component source drifted from what the patch expects; recreate the patch with `patchstack create` or resolve it through `patchstack rebase`",
    })))
}

pub(crate) fn check_failure(check: &PatchCheck) -> anyhow::Error {
    patch_failure(
        &check.patch_id,
        &check.file,
        &check.conflicts,
        check.error.as_deref(),
    )
}

pub(crate) fn result_failure(result: &PatchResult) -> anyhow::Error {
    patch_failure(
        &result.patch_id,
        &result.file,
        &result.conflicts,
        result.error.as_deref(),
    )
}

pub(crate) fn short_sha(sha: Option<&str>) -> &str {
    sha.map(short_digest).unwrap_or("-")
}

pub(crate) fn print_conflict(conflict: &Conflict) {
    let who = conflict.patch_id.as_deref().unwrap_or("-");
    let resolution = conflict
        .resolution
        .map(|r| format!(" [{}]", r.as_str()))
        .unwrap_or_default();
    println!(
        "  {who} line {}: {}{resolution}",
        conflict.line,
        conflict.kind.as_str()
    );
    println!("    expected: {:?}", conflict.expected);
    println!("    actual:   {:?}", conflict.actual);
}
