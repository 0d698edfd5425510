use similar::{Algorithm, DiffOp, capture_diff_slices};

use super::lines::split_lines;
use super::{ChangeContext, ChangeType, PatchChange, PatchFile, PatchMetadata, PatchType};
use crate::ids::new_patch_id;

#[derive(Debug, Clone)]
pub struct CreatePatchOptions {
    /// Defaults to an id derived from the component name, target and creation time.
    pub id: Option<String>,
    pub component_name: String,
    pub target_file: String,
    pub patch_type: PatchType,
    pub upstream_version: String,
    pub fragment_version: String,
    pub description: String,
    pub author: String,
    pub reason: String,
    pub dependencies: Vec<String>,
    pub context_lines: usize,
    pub now_ms: i64,
}

/// Records the edits that turn `upstream` into `modified`, with context windows taken from
/// `upstream`.
pub fn create_patch(upstream: &str, modified: &str, options: CreatePatchOptions) -> PatchFile {
    let (old, old_trailing) = split_lines(upstream);
    let (new, new_trailing) = split_lines(modified);
    let window = options.context_lines;

    let mut changes = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (change_type, old_index, old_len, new_index, new_len) = match op {
            DiffOp::Equal { .. } => continue,
            DiffOp::Delete {
                old_index,
                old_len,
                new_index,
            } => (ChangeType::Delete, old_index, old_len, new_index, 0),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => (ChangeType::Insert, old_index, 0, new_index, new_len),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => (ChangeType::Replace, old_index, old_len, new_index, new_len),
        };

        let old_end = old_index + old_len;
        let before_start = old_index.saturating_sub(window);
        let after_end = (old_end + window).min(old.len());

        changes.push(PatchChange {
            change_type,
            line: old_index + 1,
            old_content: (old_len > 0).then(|| old[old_index..old_end].join("\n")),
            new_content: (new_len > 0).then(|| new[new_index..new_index + new_len].join("\n")),
            context: ChangeContext {
                before: to_owned_lines(&old[before_start..old_index]),
                after: to_owned_lines(&old[old_end..after_end]),
            },
        });
    }

    let trailing_newline =
        (old.is_empty() || old_trailing != new_trailing).then_some(new_trailing);

    let id = options.id.unwrap_or_else(|| {
        new_patch_id(&options.component_name, &options.target_file, options.now_ms)
    });

    PatchFile {
        metadata: PatchMetadata {
            id,
            component_name: options.component_name,
            upstream_version: options.upstream_version,
            fragment_version: options.fragment_version,
            created_at: options.now_ms,
            updated_at: options.now_ms,
            description: options.description,
            author: options.author,
            reason: options.reason,
            dependencies: options.dependencies,
        },
        target_file: options.target_file,
        patch_type: options.patch_type,
        changes,
        trailing_newline,
    }
}

fn to_owned_lines(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| (*s).to_string()).collect()
}
