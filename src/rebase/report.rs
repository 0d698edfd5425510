use std::fmt::Write as _;

use time::format_description::well_known::Rfc3339;

use crate::patch::{PatchMetadata, RebaseInfo};
use crate::repository::BrokenPatch;

const RECENT_REBASES: usize = 5;

pub(crate) fn render_report(
    patches: &[PatchMetadata],
    broken: &[BrokenPatch],
    history: &[RebaseInfo],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Patch Rebase Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Active patches: {}", patches.len());
    let _ = writeln!(out, "Recorded rebases: {}", history.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "## Recent rebases");
    if history.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for rebase in history.iter().rev().take(RECENT_REBASES) {
        let _ = writeln!(
            out,
            "  - {} -> {}: {} ({} patch(es), {} conflict(s), {})",
            rebase.from_version,
            rebase.to_version,
            rebase.status,
            rebase.patches.len(),
            rebase.conflicts.len(),
            format_epoch_ms(rebase.updated_at),
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Active patches");
    if patches.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for patch in patches {
        let _ = writeln!(out, "  - {} [{}]", patch.id, patch.component_name);
        let _ = writeln!(
            out,
            "      versions: upstream {}, fragment {}",
            patch.upstream_version, patch.fragment_version
        );
        if !patch.description.is_empty() {
            let _ = writeln!(out, "      description: {}", patch.description);
        }
        if !patch.reason.is_empty() {
            let _ = writeln!(out, "      reason: {}", patch.reason);
        }
        if !patch.dependencies.is_empty() {
            let _ = writeln!(out, "      depends on: {}", patch.dependencies.join(", "));
        }
    }

    if !broken.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Unreadable patches");
        for b in broken {
            let _ = writeln!(out, "  - {} ({})", b.id, b.location);
            let _ = writeln!(out, "      error: {}", b.error);
        }
    }
    out
}

pub(crate) fn format_epoch_ms(ms: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::RebaseStatus;

    fn rebase(from: &str, status: RebaseStatus) -> RebaseInfo {
        RebaseInfo {
            from_version: from.to_string(),
            to_version: format!("{from}+1"),
            patches: Vec::new(),
            conflicts: Vec::new(),
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn report_lists_only_five_newest_rebases_newest_first() {
        let history: Vec<RebaseInfo> = (1..=7)
            .map(|i| rebase(&format!("v{i}"), RebaseStatus::Completed))
            .collect();
        let report = render_report(&[], &[], &history);

        assert!(report.contains("Recorded rebases: 7"));
        assert!(report.contains("v7 -> v7+1"));
        assert!(report.contains("v3 -> v3+1"));
        assert!(!report.contains("v2 -> v2+1"));
        let v7 = report.find("v7 ->").expect("v7 listed");
        let v3 = report.find("v3 ->").expect("v3 listed");
        assert!(v7 < v3);
    }

    #[test]
    fn format_epoch_ms_renders_rfc3339() {
        assert_eq!(format_epoch_ms(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn report_lists_unreadable_patches() {
        let broken = BrokenPatch {
            id: "bad".to_string(),
            location: "bad.json".to_string(),
            error: "invalid patch document bad.json: key must be a string".to_string(),
        };
        let report = render_report(&[], std::slice::from_ref(&broken), &[]);
        assert!(report.contains("Active patches: 0"));
        assert!(report.contains("## Unreadable patches"));
        assert!(report.contains("  - bad (bad.json)"));
        assert!(report.contains("key must be a string"));

        assert!(!render_report(&[], &[], &[]).contains("Unreadable"));
    }
}
