use std::ops::Range;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod create;
pub(crate) mod lines;

pub use create::{CreatePatchOptions, create_patch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMetadata {
    pub id: String,
    pub component_name: String,
    pub upstream_version: String,
    pub fragment_version: String,
    /// Epoch millis.
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub reason: String,
    /// Ids of patches that must be applied before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContext {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

/// One edit, positioned against the file as it was when the patch was created.
///
/// `line` is 1-based. An insert lands before original line `line` (one past the last line
/// appends); delete and replace cover the lines of `old_content`, or a single line when it is
/// absent. Content spanning several lines is joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    #[serde(default)]
    pub context: ChangeContext,
}

impl PatchChange {
    /// Original lines covered by this change, 0-based.
    pub fn span(&self) -> Range<usize> {
        let start = self.line.saturating_sub(1);
        let len = match self.change_type {
            ChangeType::Insert => 0,
            ChangeType::Delete | ChangeType::Replace => self
                .old_content
                .as_deref()
                .map_or(1, |c| c.split('\n').count()),
        };
        start..start + len
    }

    pub fn old_lines(&self) -> Option<Vec<&str>> {
        match self.change_type {
            ChangeType::Insert => None,
            ChangeType::Delete | ChangeType::Replace => {
                self.old_content.as_deref().map(|c| c.split('\n').collect())
            }
        }
    }

    /// Lines that take the place of [`Self::span`].
    pub fn new_lines(&self) -> Vec<&str> {
        match (self.change_type, self.new_content.as_deref()) {
            (ChangeType::Delete, _) | (_, None) => Vec::new(),
            (_, Some(content)) => content.split('\n').collect(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.line == 0 {
            return Err("change line numbers are 1-based (got 0)".to_string());
        }
        match self.change_type {
            ChangeType::Insert if self.new_content.is_none() => Err(format!(
                "insert at line {} has no newContent",
                self.line
            )),
            ChangeType::Delete if self.new_content.is_some() => Err(format!(
                "delete at line {} must not carry newContent",
                self.line
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    /// The target exists and is edited in place.
    Modify,
    /// The target does not exist yet and is created.
    Add,
    /// The target exists and is deleted once its content is verified.
    Remove,
    /// The target is rewritten; a missing target counts as empty.
    Replace,
}

impl PatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchType::Modify => "modify",
            PatchType::Add => "add",
            PatchType::Remove => "remove",
            PatchType::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchFile {
    pub metadata: PatchMetadata,
    /// POSIX path relative to the component source root.
    pub target_file: String,
    pub patch_type: PatchType,
    #[serde(default)]
    pub changes: Vec<PatchChange>,
    /// Trailing newline of the patched file; `None` keeps whatever the target has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing_newline: Option<bool>,
}

impl PatchFile {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Rejects malformed changes. Overlaps are reported separately by [`Self::overlaps`].
    pub fn validate(&self) -> Result<(), String> {
        if !crate::storage::validate_posix_relpath(&self.target_file) {
            return Err(format!(
                "targetFile must be a relative POSIX path: {}",
                self.target_file
            ));
        }
        for change in &self.changes {
            change.validate()?;
        }
        Ok(())
    }

    /// Pairs of changes that touch the same original lines. Applying against original offsets
    /// is only well-defined when this is empty.
    pub fn overlaps(&self) -> Vec<Conflict> {
        let mut out = Vec::new();
        for (i, a) in self.changes.iter().enumerate() {
            for (j, b) in self.changes.iter().enumerate().skip(i + 1) {
                if changes_overlap(a, b) {
                    out.push(Conflict {
                        kind: ConflictKind::Overlap,
                        line: b.line,
                        expected: format!("change {j} clear of change {i} (line {})", a.line),
                        actual: format!(
                            "change {j} ({}) overlaps change {i} ({})",
                            describe_span(b),
                            describe_span(a)
                        ),
                        resolution: None,
                        patch_id: None,
                        change: Some(j),
                    });
                }
            }
        }
        out
    }
}

fn changes_overlap(a: &PatchChange, b: &PatchChange) -> bool {
    let (sa, sb) = (a.span(), b.span());
    match (sa.is_empty(), sb.is_empty()) {
        (true, true) => sa.start == sb.start,
        (true, false) => sb.start < sa.start && sa.start < sb.end,
        (false, true) => sa.start < sb.start && sb.start < sa.end,
        (false, false) => sa.start < sb.end && sb.start < sa.end,
    }
}

fn describe_span(change: &PatchChange) -> String {
    let span = change.span();
    if span.is_empty() {
        format!("insert before line {}", change.line)
    } else {
        format!("lines {}-{}", span.start + 1, span.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep upstream as-is and skip the patch.
    Keep,
    /// Attempt the patch anyway.
    Apply,
    /// The conflict was fixed by hand; attempt the patch again.
    Manual,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Keep => "keep",
            Resolution::Apply => "apply",
            Resolution::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    #[default]
    ContextBefore,
    ContextAfter,
    OldContent,
    Overlap,
    TargetExists,
    TargetMissing,
    InvalidPatch,
    UnmetDependency,
    DependencyCycle,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::ContextBefore => "context_before",
            ConflictKind::ContextAfter => "context_after",
            ConflictKind::OldContent => "old_content",
            ConflictKind::Overlap => "overlap",
            ConflictKind::TargetExists => "target_exists",
            ConflictKind::TargetMissing => "target_missing",
            ConflictKind::InvalidPatch => "invalid_patch",
            ConflictKind::UnmetDependency => "unmet_dependency",
            ConflictKind::DependencyCycle => "dependency_cycle",
        }
    }
}

/// One point where a patch's recorded view of the file disagrees with the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(default)]
    pub kind: ConflictKind,
    pub line: usize,
    pub expected: String,
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
    /// Index of the triggering change within its patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<usize>,
}

impl Conflict {
    pub fn for_patch(mut self, patch_id: &str) -> Self {
        self.patch_id = Some(patch_id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchCheck {
    pub patch_id: String,
    pub file: String,
    pub can_apply: bool,
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub success: bool,
    pub patch_id: String,
    pub file: String,
    /// False for failed attempts; a clean dry run is a success that applied nothing.
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebaseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl RebaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RebaseStatus::Pending => "pending",
            RebaseStatus::InProgress => "in-progress",
            RebaseStatus::Completed => "completed",
            RebaseStatus::Failed => "failed",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, RebaseStatus::Completed | RebaseStatus::Failed)
    }
}

impl std::fmt::Display for RebaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseInfo {
    pub from_version: String,
    pub to_version: String,
    pub patches: Vec<PatchMetadata>,
    pub conflicts: Vec<Conflict>,
    pub status: RebaseStatus,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

pub fn now_epoch_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
