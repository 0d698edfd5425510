use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::engine::{PatchEngine, TARGET_NOT_FOUND};
use crate::patch::{
    Conflict, ConflictKind, PatchMetadata, PatchResult, RebaseInfo, RebaseStatus, Resolution,
    now_epoch_ms,
};
use crate::repository::{BrokenPatch, PatchRepository, PatchScan};
use crate::user_error::UserError;

pub mod history;
mod order;
mod report;

pub use history::{RebaseHistory, latest_index};

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseOutcome {
    pub success: bool,
    pub applied: u64,
    pub failed: u64,
    /// Not attempted: kept upstream on purpose, or blocked by a dependency.
    pub skipped: u64,
    pub conflicts: Vec<Conflict>,
    pub results: Vec<PatchResult>,
}

/// Drives a whole patch set across an upstream version bump. Every call reads the history,
/// updates it and writes it back; nothing is cached between calls.
pub struct Rebaser<'a> {
    repository: &'a PatchRepository<'a>,
    engine: &'a PatchEngine<'a>,
    history: &'a RebaseHistory<'a>,
}

impl<'a> Rebaser<'a> {
    pub fn new(engine: &'a PatchEngine<'a>, history: &'a RebaseHistory<'a>) -> Self {
        Self {
            repository: engine.repository(),
            engine,
            history,
        }
    }

    /// Checks every patch and records a new rebase. Never touches component sources.
    pub fn start(&self, from_version: &str, to_version: &str) -> anyhow::Result<RebaseInfo> {
        let PatchScan { patches, broken } = self.repository.scan()?;

        let mut conflicts: Vec<Conflict> = broken.iter().map(broken_conflict).collect();
        for patch in &patches {
            let check = self.engine.check_patch(patch);
            conflicts.extend(check.conflicts.into_iter().map(|c| c.for_patch(patch.id())));
            if let Some(error) = check.error {
                conflicts.push(error_conflict(patch.id(), &patch.target_file, &error));
            }
        }

        let status = if conflicts.is_empty() {
            RebaseStatus::InProgress
        } else {
            RebaseStatus::Pending
        };
        let now = now_epoch_ms();
        let info = RebaseInfo {
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            patches: patches.into_iter().map(|p| p.metadata).collect(),
            conflicts,
            status,
            created_at: now,
            updated_at: now,
        };

        let mut history = self.history.load()?;
        history.push(info.clone());
        self.history.save(&history)?;

        tracing::info!(
            from = from_version,
            to = to_version,
            patches = info.patches.len(),
            unreadable = broken.len(),
            conflicts = info.conflicts.len(),
            status = %info.status,
            "rebase started"
        );
        Ok(info)
    }

    /// Records how the conflicts of one patch are to be handled. A pending rebase becomes
    /// in-progress once every conflict has a resolution.
    pub fn resolve(
        &self,
        rebase_id: &str,
        patch_id: &str,
        resolution: Resolution,
    ) -> anyhow::Result<RebaseInfo> {
        let mut history = self.history.load()?;
        let idx =
            latest_index(&history, rebase_id).ok_or_else(|| UserError::rebase_not_found(rebase_id))?;
        let info = &mut history[idx];
        if info.status.is_finished() {
            return Err(UserError::rebase_finished(rebase_id, info.status.as_str()));
        }

        let mut touched = 0usize;
        for conflict in info
            .conflicts
            .iter_mut()
            .filter(|c| c.patch_id.as_deref() == Some(patch_id))
        {
            conflict.resolution = Some(resolution);
            touched += 1;
        }
        if touched == 0 {
            return Err(anyhow::Error::new(
                UserError::new(
                    "E_CONFLICT_NOT_FOUND",
                    format!("rebase from {rebase_id} has no conflicts for patch {patch_id}"),
                )
                .with_details(serde_json::json!({
                    "rebase_id": rebase_id,
                    "patch_id": patch_id,
                    "hint": "run `patchstack history` to see the recorded conflicts",
                })),
            ));
        }

        if info.status == RebaseStatus::Pending
            && info.conflicts.iter().all(|c| c.resolution.is_some())
        {
            info.status = RebaseStatus::InProgress;
        }
        info.updated_at = now_epoch_ms();
        let updated = info.clone();
        self.history.save(&history)?;

        tracing::info!(
            rebase = rebase_id,
            patch_id,
            resolution = ?resolution,
            status = %updated.status,
            "conflicts resolved"
        );
        Ok(updated)
    }

    /// Applies the patch set of the newest rebase started from `rebase_id`.
    ///
    /// Patches are attempted independently in dependency order. A patch whose dependencies did
    /// not all apply is skipped and reported as an `unmet_dependency` conflict. Patches that
    /// were unreadable when the rebase started count as failed unless kept. The rebase ends
    /// `completed` only when no conflict remains.
    pub fn apply(&self, rebase_id: &str) -> anyhow::Result<RebaseOutcome> {
        let mut history = self.history.load()?;
        let idx =
            latest_index(&history, rebase_id).ok_or_else(|| UserError::rebase_not_found(rebase_id))?;
        if history[idx].status.is_finished() {
            return Err(UserError::rebase_finished(
                rebase_id,
                history[idx].status.as_str(),
            ));
        }

        let info = &history[idx];
        let kept = kept_patches(&info.conflicts);
        let snapshot_ids: BTreeSet<&str> = info.patches.iter().map(|p| p.id.as_str()).collect();
        let plan = order::dependency_order(&info.patches);

        let mut outcome = RebaseOutcome::default();
        let mut applied_ids: BTreeSet<String> = BTreeSet::new();
        let mut states: BTreeMap<String, &'static str> = BTreeMap::new();

        // Recorded at start without metadata, so they are outside the dependency plan.
        let mut unreadable: BTreeMap<&str, Vec<&Conflict>> = BTreeMap::new();
        for conflict in &info.conflicts {
            match conflict.patch_id.as_deref() {
                Some(id) if !snapshot_ids.contains(id) => {
                    unreadable.entry(id).or_default().push(conflict);
                }
                _ => {}
            }
        }
        for (id, recorded) in unreadable {
            if kept.contains(id) {
                outcome.skipped += 1;
                states.insert(id.to_string(), "kept");
                continue;
            }
            outcome.failed += 1;
            states.insert(id.to_string(), "failed");
            outcome.conflicts.extend(recorded.into_iter().cloned());
            tracing::warn!(patch_id = id, "unreadable patch not applied");
        }

        for &i in &plan.order {
            let meta = &info.patches[i];
            let id = meta.id.as_str();

            if plan.cyclic.contains(&i) {
                outcome.skipped += 1;
                states.insert(id.to_string(), "skipped");
                outcome.conflicts.push(dependency_conflict(
                    meta,
                    ConflictKind::DependencyCycle,
                    "acyclic dependencies".to_string(),
                    format!("{id} is part of a dependency cycle"),
                ));
                continue;
            }

            let unmet: Vec<&String> = meta
                .dependencies
                .iter()
                .filter(|d| !applied_ids.contains(d.as_str()))
                .collect();
            if !unmet.is_empty() {
                outcome.skipped += 1;
                states.insert(id.to_string(), "skipped");
                for dep in unmet {
                    let state = states.get(dep.as_str()).copied().unwrap_or(
                        if snapshot_ids.contains(dep.as_str()) {
                            "not attempted"
                        } else {
                            "missing"
                        },
                    );
                    outcome.conflicts.push(dependency_conflict(
                        meta,
                        ConflictKind::UnmetDependency,
                        format!("{dep} applied"),
                        format!("{dep} {state}"),
                    ));
                }
                tracing::info!(patch_id = id, "skipping patch with unmet dependencies");
                continue;
            }

            if kept.contains(id) {
                outcome.skipped += 1;
                states.insert(id.to_string(), "kept");
                tracing::info!(patch_id = id, "keeping upstream, patch skipped");
                continue;
            }

            let patch = match self.repository.load(id) {
                Ok(patch) => patch,
                Err(err) => {
                    let error = format!("{err:#}");
                    outcome.failed += 1;
                    states.insert(id.to_string(), "failed");
                    outcome.conflicts.push(error_conflict(id, "", &error));
                    outcome.results.push(PatchResult {
                        success: false,
                        patch_id: id.to_string(),
                        file: String::new(),
                        applied: false,
                        conflicts: Vec::new(),
                        error: Some(error),
                        before_sha256: None,
                        after_sha256: None,
                    });
                    continue;
                }
            };

            let result = self.engine.apply_patch(&patch);
            if result.success {
                outcome.applied += 1;
                applied_ids.insert(id.to_string());
                states.insert(id.to_string(), "applied");
                self.bump_upstream_version(patch, &info.to_version);
            } else {
                outcome.failed += 1;
                states.insert(id.to_string(), "failed");
                outcome
                    .conflicts
                    .extend(result.conflicts.iter().cloned().map(|c| c.for_patch(id)));
                if let Some(error) = &result.error {
                    outcome
                        .conflicts
                        .push(error_conflict(id, &result.file, error));
                }
            }
            outcome.results.push(result);
        }

        outcome.success = outcome.conflicts.is_empty();

        let info = &mut history[idx];
        info.conflicts = outcome.conflicts.clone();
        info.status = if outcome.success {
            RebaseStatus::Completed
        } else {
            RebaseStatus::Failed
        };
        info.updated_at = now_epoch_ms();
        let status = info.status;
        self.history.save(&history)?;

        tracing::info!(
            rebase = rebase_id,
            applied = outcome.applied,
            failed = outcome.failed,
            skipped = outcome.skipped,
            conflicts = outcome.conflicts.len(),
            status = %status,
            "rebase applied"
        );
        Ok(outcome)
    }

    pub fn report(&self) -> anyhow::Result<String> {
        let scan = self.repository.scan()?;
        let patches: Vec<PatchMetadata> = scan.patches.into_iter().map(|p| p.metadata).collect();
        let history = self.history.load()?;
        Ok(report::render_report(&patches, &scan.broken, &history))
    }

    fn bump_upstream_version(&self, mut patch: crate::patch::PatchFile, to_version: &str) {
        patch.metadata.upstream_version = to_version.to_string();
        patch.metadata.updated_at = now_epoch_ms();
        if let Err(err) = self.repository.save(&patch) {
            tracing::warn!(
                patch_id = %patch.metadata.id,
                error = %format!("{err:#}"),
                "applied patch but could not record the new upstream version"
            );
        }
    }
}

/// Patches whose recorded conflicts were all resolved with `keep`.
fn kept_patches(conflicts: &[Conflict]) -> BTreeSet<String> {
    let mut by_patch: BTreeMap<&str, bool> = BTreeMap::new();
    for conflict in conflicts {
        let Some(id) = conflict.patch_id.as_deref() else {
            continue;
        };
        let keep = conflict.resolution == Some(Resolution::Keep);
        by_patch
            .entry(id)
            .and_modify(|all| *all &= keep)
            .or_insert(keep);
    }
    by_patch
        .into_iter()
        .filter(|(_, keep)| *keep)
        .map(|(id, _)| id.to_string())
        .collect()
}

fn dependency_conflict(
    meta: &PatchMetadata,
    kind: ConflictKind,
    expected: String,
    actual: String,
) -> Conflict {
    Conflict {
        kind,
        line: 0,
        expected,
        actual,
        resolution: None,
        patch_id: Some(meta.id.clone()),
        change: None,
    }
}

fn broken_conflict(broken: &BrokenPatch) -> Conflict {
    Conflict {
        kind: ConflictKind::InvalidPatch,
        line: 0,
        expected: broken.location.clone(),
        actual: broken.error.clone(),
        resolution: None,
        patch_id: Some(broken.id.clone()),
        change: None,
    }
}

/// Folds a failure that is not a context mismatch into the conflict list, so a rebase cannot
/// complete past it.
fn error_conflict(patch_id: &str, file: &str, error: &str) -> Conflict {
    let kind = if error == TARGET_NOT_FOUND {
        ConflictKind::TargetMissing
    } else {
        ConflictKind::InvalidPatch
    };
    Conflict {
        kind,
        line: 0,
        expected: file.to_string(),
        actual: error.to_string(),
        resolution: None,
        patch_id: Some(patch_id.to_string()),
        change: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{CreatePatchOptions, PatchType, create_patch};
    use crate::storage::MemoryStorage;

    const CARD_V1: &str = "export const Card = () => {\n  return <div className=\"card\" />;\n};\n";

    fn card_patch(id: &str) -> crate::patch::PatchFile {
        let modified = CARD_V1.replace("\"card\"", "\"card card--acme\"");
        create_patch(
            CARD_V1,
            &modified,
            CreatePatchOptions {
                id: Some(id.to_string()),
                component_name: "Card".to_string(),
                target_file: "card.tsx".to_string(),
                patch_type: PatchType::Modify,
                upstream_version: "1".to_string(),
                fragment_version: "1-acme".to_string(),
                description: String::new(),
                author: "dev".to_string(),
                reason: String::new(),
                dependencies: Vec::new(),
                context_lines: 1,
                now_ms: 1_700_000_000_000,
            },
        )
    }

    /// One readable patch plus `bad.json`, which is not JSON at all.
    fn stores_with_unreadable_patch()
    -> anyhow::Result<(MemoryStorage, MemoryStorage, MemoryStorage)> {
        let patches = MemoryStorage::with_entries([("bad.json", "{oops")]);
        PatchRepository::new(&patches).save(&card_patch("card-acme"))?;
        let components = MemoryStorage::with_entries([("card.tsx", CARD_V1)]);
        Ok((patches, components, MemoryStorage::new()))
    }

    fn conflict(patch_id: &str, resolution: Option<Resolution>) -> Conflict {
        Conflict {
            kind: ConflictKind::ContextBefore,
            line: 1,
            expected: "a".to_string(),
            actual: "b".to_string(),
            resolution,
            patch_id: Some(patch_id.to_string()),
            change: Some(0),
        }
    }

    #[test]
    fn kept_patches_requires_every_conflict_kept() {
        let conflicts = vec![
            conflict("a", Some(Resolution::Keep)),
            conflict("a", Some(Resolution::Keep)),
            conflict("b", Some(Resolution::Keep)),
            conflict("b", Some(Resolution::Manual)),
            conflict("c", None),
        ];
        assert_eq!(kept_patches(&conflicts), BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn error_conflict_classifies_missing_targets() {
        let c = error_conflict("p", "x.tsx", TARGET_NOT_FOUND);
        assert_eq!(c.kind, ConflictKind::TargetMissing);
        let c = error_conflict("p", "x.tsx", "invalid patch: nope");
        assert_eq!(c.kind, ConflictKind::InvalidPatch);
    }

    #[test]
    fn start_records_unreadable_patch_as_conflict() -> anyhow::Result<()> {
        let (patches, components, workspace) = stores_with_unreadable_patch()?;
        let repo = PatchRepository::new(&patches);
        let engine = PatchEngine::new(&repo, &components);
        let history = RebaseHistory::new(&workspace, "history.json");
        let rebaser = Rebaser::new(&engine, &history);

        let info = rebaser.start("1", "2")?;
        assert_eq!(info.status, RebaseStatus::Pending);
        assert_eq!(info.patches.len(), 1);
        assert_eq!(info.conflicts.len(), 1);
        assert_eq!(info.conflicts[0].kind, ConflictKind::InvalidPatch);
        assert_eq!(info.conflicts[0].patch_id.as_deref(), Some("bad"));
        assert_eq!(history.load()?.len(), 1);

        assert!(rebaser.report()?.contains("  - bad (bad.json)"));
        Ok(())
    }

    #[test]
    fn unreadable_patch_fails_apply_unless_kept() -> anyhow::Result<()> {
        let (patches, components, workspace) = stores_with_unreadable_patch()?;
        let repo = PatchRepository::new(&patches);
        let engine = PatchEngine::new(&repo, &components);
        let history = RebaseHistory::new(&workspace, "history.json");
        let rebaser = Rebaser::new(&engine, &history);

        rebaser.start("1", "2")?;
        let outcome = rebaser.apply("1")?;
        assert!(!outcome.success);
        assert_eq!((outcome.applied, outcome.failed, outcome.skipped), (1, 1, 0));
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::InvalidPatch);
        assert_eq!(history.load()?[0].status, RebaseStatus::Failed);

        let restored = MemoryStorage::with_entries([("card.tsx", CARD_V1)]);
        let engine = PatchEngine::new(&repo, &restored);
        let rebaser = Rebaser::new(&engine, &history);
        rebaser.start("2", "3")?;
        let info = rebaser.resolve("2", "bad", Resolution::Keep)?;
        assert_eq!(info.status, RebaseStatus::InProgress);
        let outcome = rebaser.apply("2")?;
        assert!(outcome.success);
        assert_eq!((outcome.applied, outcome.failed, outcome.skipped), (1, 0, 1));
        Ok(())
    }
}
