use anyhow::Context as _;

use crate::patch::RebaseInfo;
use crate::storage::Storage;
use crate::user_error::UserError;

/// Append-only log of rebase attempts, persisted as one pretty-printed JSON array.
///
/// Nothing is ever compacted. Concurrent writers are unsupported: the last `save` wins.
pub struct RebaseHistory<'s> {
    storage: &'s dyn Storage,
    key: String,
}

impl<'s> RebaseHistory<'s> {
    pub fn new(storage: &'s dyn Storage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// A missing history file is an empty history.
    pub fn load(&self) -> anyhow::Result<Vec<RebaseInfo>> {
        let Some(raw) = self
            .storage
            .read(&self.key)
            .with_context(|| format!("read rebase history {}", self.storage.describe(&self.key)))?
        else {
            return Ok(Vec::new());
        };

        serde_json::from_slice(&raw).map_err(|err| {
            UserError::config_invalid(
                format!(
                    "invalid rebase history {}: {err}",
                    self.storage.describe(&self.key)
                ),
                serde_json::json!({
                    "path": self.storage.describe(&self.key),
                    "hint": "the history file must hold a JSON array of rebase records",
                }),
            )
        })
    }

    pub fn save(&self, history: &[RebaseInfo]) -> anyhow::Result<()> {
        let mut out = serde_json::to_string_pretty(history).context("serialize rebase history")?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        self.storage
            .write(&self.key, out.as_bytes())
            .with_context(|| format!("write rebase history {}", self.storage.describe(&self.key)))
    }
}

/// Index of the newest record started from `from_version`.
pub fn latest_index(history: &[RebaseInfo], from_version: &str) -> Option<usize> {
    history.iter().rposition(|r| r.from_version == from_version)
}
