use crate::hash::sha256_hex;
use crate::patch::lines::{join_lines, split_lines};
use crate::patch::{
    ChangeType, Conflict, ConflictKind, PatchChange, PatchCheck, PatchFile, PatchResult, PatchType,
};
use crate::repository::PatchRepository;
use crate::storage::Storage;

pub const TARGET_NOT_FOUND: &str = "target file not found";

const END_OF_FILE: &str = "<end of file>";

/// Checks and applies patches against the component source tree.
pub struct PatchEngine<'a> {
    repository: &'a PatchRepository<'a>,
    components: &'a dyn Storage,
}

/// A check plus the target content it was computed against.
struct Inspection {
    check: PatchCheck,
    original: Option<Vec<u8>>,
}

impl<'a> PatchEngine<'a> {
    pub fn new(repository: &'a PatchRepository<'a>, components: &'a dyn Storage) -> Self {
        Self {
            repository,
            components,
        }
    }

    pub fn repository(&self) -> &'a PatchRepository<'a> {
        self.repository
    }

    /// Dry run. Only an unknown patch id is an `Err`.
    pub fn check(&self, patch_id: &str) -> anyhow::Result<PatchCheck> {
        let patch = self.repository.load(patch_id)?;
        Ok(self.check_patch(&patch))
    }

    pub fn check_patch(&self, patch: &PatchFile) -> PatchCheck {
        self.inspect(patch).check
    }

    /// Applies every change or none of them. Only an unknown patch id is an `Err`.
    pub fn apply(&self, patch_id: &str) -> anyhow::Result<PatchResult> {
        let patch = self.repository.load(patch_id)?;
        Ok(self.apply_patch(&patch))
    }

    pub fn apply_patch(&self, patch: &PatchFile) -> PatchResult {
        let Inspection { check, original } = self.inspect(patch);
        let before_sha256 = original.as_deref().map(sha256_hex);

        let mut result = PatchResult {
            success: false,
            patch_id: check.patch_id,
            file: check.file,
            applied: false,
            conflicts: check.conflicts,
            error: check.error,
            before_sha256,
            after_sha256: None,
        };
        if !check.can_apply {
            match &result.error {
                Some(error) => tracing::warn!(
                    patch_id = %result.patch_id,
                    file = %result.file,
                    error = %error,
                    "patch not applied"
                ),
                None => tracing::info!(
                    patch_id = %result.patch_id,
                    file = %result.file,
                    conflicts = result.conflicts.len(),
                    "patch not applied"
                ),
            }
            return result;
        }

        let original_text = original
            .as_deref()
            .map(String::from_utf8_lossy)
            .unwrap_or_default();

        let written = if patch.patch_type == PatchType::Remove {
            self.components.remove(&patch.target_file).map(|_| None)
        } else {
            let updated = render_patched(&original_text, patch);
            self.components
                .write(&patch.target_file, updated.as_bytes())
                .map(|()| Some(sha256_hex(updated.as_bytes())))
        };

        match written {
            Ok(after_sha256) => {
                tracing::info!(
                    patch_id = %result.patch_id,
                    file = %result.file,
                    changes = patch.changes.len(),
                    "patch applied"
                );
                result.success = true;
                result.applied = true;
                result.after_sha256 = after_sha256;
            }
            Err(err) => {
                tracing::warn!(
                    patch_id = %result.patch_id,
                    file = %result.file,
                    error = %format!("{err:#}"),
                    "patch write failed"
                );
                result.error = Some(format!("{err:#}"));
            }
        }
        result
    }

    fn inspect(&self, patch: &PatchFile) -> Inspection {
        let mut check = PatchCheck {
            patch_id: patch.id().to_string(),
            file: patch.target_file.clone(),
            can_apply: false,
            conflicts: Vec::new(),
            error: None,
        };

        if let Err(reason) = patch.validate() {
            check.error = Some(format!("invalid patch: {reason}"));
            return Inspection {
                check,
                original: None,
            };
        }

        let original = match self.components.read(&patch.target_file) {
            Ok(bytes) => bytes,
            Err(err) => {
                check.error = Some(format!("{err:#}"));
                return Inspection {
                    check,
                    original: None,
                };
            }
        };

        match (patch.patch_type, original.is_some()) {
            (PatchType::Modify | PatchType::Remove, false) => {
                check.error = Some(TARGET_NOT_FOUND.to_string());
                return Inspection { check, original };
            }
            (PatchType::Add, true) => {
                check.conflicts.push(Conflict {
                    kind: ConflictKind::TargetExists,
                    line: 1,
                    expected: "<absent>".to_string(),
                    actual: "<exists>".to_string(),
                    resolution: None,
                    patch_id: None,
                    change: None,
                });
                return Inspection { check, original };
            }
            _ => {}
        }

        let text = match original.as_deref().map(std::str::from_utf8).transpose() {
            Ok(text) => text.unwrap_or_default(),
            Err(_) => {
                check.error = Some("target file is not valid UTF-8 text".to_string());
                return Inspection { check, original };
            }
        };

        let (lines, _) = split_lines(text);
        check.conflicts.extend(patch.overlaps());
        for (index, change) in patch.changes.iter().enumerate() {
            check_change(&lines, index, change, &mut check.conflicts);
        }

        check.can_apply = check.conflicts.is_empty();
        if check.can_apply {
            tracing::debug!(patch_id = %check.patch_id, file = %check.file, "patch is clean");
        } else {
            tracing::info!(
                patch_id = %check.patch_id,
                file = %check.file,
                conflicts = check.conflicts.len(),
                "patch conflicts with current file"
            );
        }
        Inspection { check, original }
    }
}

fn check_change(lines: &[&str], index: usize, change: &PatchChange, out: &mut Vec<Conflict>) {
    let span = change.span();
    let conflict = |kind, expected: String, actual: String| Conflict {
        kind,
        line: change.line,
        expected,
        actual,
        resolution: None,
        patch_id: None,
        change: Some(index),
    };

    if span.end > lines.len() {
        let expected = change
            .old_content
            .clone()
            .unwrap_or_else(|| format!("<line {}>", change.line));
        let present = lines.get(span.start..).unwrap_or_default();
        let actual = if present.is_empty() {
            END_OF_FILE.to_string()
        } else {
            present.join("\n")
        };
        out.push(conflict(ConflictKind::OldContent, expected, actual));
        return;
    }

    let before = &change.context.before;
    let before_actual = &lines[span.start.saturating_sub(before.len())..span.start];
    if before_actual != before.as_slice() {
        out.push(conflict(
            ConflictKind::ContextBefore,
            before.join("\n"),
            before_actual.join("\n"),
        ));
    }

    let after = &change.context.after;
    let after_actual = &lines[span.end..(span.end + after.len()).min(lines.len())];
    if after_actual != after.as_slice() {
        out.push(conflict(
            ConflictKind::ContextAfter,
            after.join("\n"),
            if after_actual.is_empty() {
                END_OF_FILE.to_string()
            } else {
                after_actual.join("\n")
            },
        ));
    }

    if let Some(old) = change.old_lines() {
        let current = &lines[span.clone()];
        if current != old.as_slice() {
            out.push(conflict(
                ConflictKind::OldContent,
                old.join("\n"),
                current.join("\n"),
            ));
        }
    }
}

/// Rewrites `original` in one pass over its lines. Changes are taken in original-line order
/// (an insert before an edit at the same line), so the declared order of a clean patch does not
/// matter. Callers must have checked the patch first.
pub(crate) fn render_patched(original: &str, patch: &PatchFile) -> String {
    let (lines, trailing_newline) = split_lines(original);

    let mut order: Vec<&PatchChange> = patch.changes.iter().collect();
    order.sort_by_key(|c| (c.span().start, c.change_type != ChangeType::Insert));

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut cursor = 0;
    for change in order {
        let span = change.span();
        let start = span.start.clamp(cursor, lines.len());
        out.extend_from_slice(&lines[cursor..start]);
        out.extend(change.new_lines());
        cursor = span.end.clamp(start, lines.len());
    }
    out.extend_from_slice(&lines[cursor..]);

    let trailing_newline = patch
        .trailing_newline
        .unwrap_or(trailing_newline || lines.is_empty());
    join_lines(&out, trailing_newline)
}
