use anyhow::Context as _;
use serde::Serialize;

use crate::ids::is_valid_patch_id;
use crate::patch::{PatchFile, PatchMetadata};
use crate::storage::Storage;
use crate::user_error::{UserError, error_code};

const PATCH_EXT: &str = ".json";

/// A stored patch document that exists but cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenPatch {
    pub id: String,
    pub location: String,
    pub error: String,
}

impl BrokenPatch {
    pub fn warning(&self) -> String {
        format!("patch {} is unreadable: {}", self.id, self.error)
    }
}

#[derive(Debug, Default)]
pub struct PatchScan {
    pub patches: Vec<PatchFile>,
    pub broken: Vec<BrokenPatch>,
}

/// The durable set of patches, one JSON document per patch keyed by id.
pub struct PatchRepository<'s> {
    storage: &'s dyn Storage,
}

impl<'s> PatchRepository<'s> {
    pub fn new(storage: &'s dyn Storage) -> Self {
        Self { storage }
    }

    fn key(id: &str) -> String {
        format!("{id}{PATCH_EXT}")
    }

    /// Metadata of every readable patch, ordered by creation time then id. Unreadable
    /// documents are left out; [`PatchRepository::scan`] reports them.
    pub fn list(&self) -> anyhow::Result<Vec<PatchMetadata>> {
        Ok(self
            .scan()?
            .patches
            .into_iter()
            .map(|p| p.metadata)
            .collect())
    }

    /// Loads every stored patch. A document that fails to load is collected in
    /// [`PatchScan::broken`] instead of failing the whole listing.
    pub fn scan(&self) -> anyhow::Result<PatchScan> {
        let mut scan = PatchScan::default();
        for key in self.storage.list("")? {
            let Some(id) = key.strip_suffix(PATCH_EXT) else {
                continue;
            };
            if key.contains('/') || !is_valid_patch_id(id) {
                continue;
            }
            match self.load(id) {
                Ok(patch) => scan.patches.push(patch),
                // removed since the listing
                Err(err) if error_code(&err) == Some("E_PATCH_NOT_FOUND") => {}
                Err(err) => {
                    let error = format!("{err:#}");
                    tracing::debug!(patch_id = id, error = %error, "unreadable patch document");
                    scan.broken.push(BrokenPatch {
                        id: id.to_string(),
                        location: self.storage.describe(&key),
                        error,
                    });
                }
            }
        }
        scan.patches.sort_by(|a, b| {
            (a.metadata.created_at, &a.metadata.id).cmp(&(b.metadata.created_at, &b.metadata.id))
        });
        Ok(scan)
    }

    pub fn exists(&self, id: &str) -> anyhow::Result<bool> {
        if !is_valid_patch_id(id) {
            return Ok(false);
        }
        Ok(self.storage.read(&Self::key(id))?.is_some())
    }

    pub fn load(&self, id: &str) -> anyhow::Result<PatchFile> {
        if !is_valid_patch_id(id) {
            return Err(UserError::patch_not_found(id));
        }
        let key = Self::key(id);
        let Some(raw) = self.storage.read(&key)? else {
            return Err(UserError::patch_not_found(id));
        };

        let location = self.storage.describe(&key);
        let patch: PatchFile = serde_json::from_slice(&raw).map_err(|err| {
            UserError::config_invalid(
                format!("invalid patch document {location}: {err}"),
                serde_json::json!({
                    "patch_id": id,
                    "path": location,
                    "hint": "fix the JSON by hand or remove the patch and create it again",
                }),
            )
        })?;

        if patch.metadata.id != id {
            return Err(UserError::config_invalid(
                format!(
                    "patch document {location} declares id {} (expected {id})",
                    patch.metadata.id
                ),
                serde_json::json!({
                    "patch_id": id,
                    "declared_id": patch.metadata.id,
                    "path": location,
                    "hint": "patch ids must match their file name",
                }),
            ));
        }

        Ok(patch)
    }

    /// Writes (or overwrites) one patch.
    pub fn save(&self, patch: &PatchFile) -> anyhow::Result<()> {
        let id = patch.id();
        if !is_valid_patch_id(id) {
            return Err(UserError::config_invalid(
                format!("invalid patch id: {id}"),
                serde_json::json!({
                    "patch_id": id,
                    "hint": "patch ids may contain ASCII letters, digits, '-', '_' and '.'",
                }),
            ));
        }
        patch.validate().map_err(|reason| {
            UserError::config_invalid(
                format!("invalid patch {id}: {reason}"),
                serde_json::json!({ "patch_id": id }),
            )
        })?;

        let mut out = serde_json::to_string_pretty(patch).context("serialize patch")?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        self.storage
            .write(&Self::key(id), out.as_bytes())
            .with_context(|| format!("save patch {id}"))
    }

    /// Saves a new patch, refusing to overwrite an existing id.
    pub fn insert(&self, patch: &PatchFile) -> anyhow::Result<()> {
        if self.exists(patch.id())? {
            return Err(UserError::patch_exists(patch.id()));
        }
        self.save(patch)
    }

    pub fn remove(&self, id: &str) -> anyhow::Result<()> {
        if !self.exists(id)? {
            return Err(UserError::patch_not_found(id));
        }
        self.storage
            .remove(&Self::key(id))
            .with_context(|| format!("remove patch {id}"))?;
        Ok(())
    }
}
