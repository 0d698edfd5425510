use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::fs::write_atomic;
use crate::storage::validate_posix_relpath;
use crate::user_error::UserError;

pub const CONFIG_FILENAME: &str = "patchstack.yaml";
const CONFIG_VERSION: u32 = 1;
const MAX_CONTEXT_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Root of the vendored component sources that patches target.
    #[serde(default = "default_components_dir")]
    pub components_dir: String,
    #[serde(default = "default_patches_dir")]
    pub patches_dir: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Context window captured around each edit by `create`.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_components_dir() -> String {
    "components".to_string()
}

fn default_patches_dir() -> String {
    ".patchstack/patches".to_string()
}

fn default_history_file() -> String {
    ".patchstack/rebase-history.json".to_string()
}

fn default_context_lines() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            components_dir: default_components_dir(),
            patches_dir: default_patches_dir(),
            history_file: default_history_file(),
            context_lines: default_context_lines(),
        }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&raw).map_err(|err| {
            UserError::config_invalid(
                format!("invalid config {}: {err}", path.display()),
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "hint": "run `patchstack init` in an empty directory to see the expected layout",
                }),
            )
        })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let out = serde_yaml::to_string(self).context("serialize config")?;
        write_atomic(path, out.as_bytes()).with_context(|| format!("write {}", path.display()))
    }

    fn validate(&self, path: &Path) -> anyhow::Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(UserError::config_invalid(
                format!(
                    "unsupported config version {} in {} (expected {CONFIG_VERSION})",
                    self.version,
                    path.display()
                ),
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "version": self.version,
                }),
            ));
        }

        for (field, value) in [
            ("components_dir", &self.components_dir),
            ("patches_dir", &self.patches_dir),
            ("history_file", &self.history_file),
        ] {
            if !validate_posix_relpath(value) {
                return Err(UserError::config_invalid(
                    format!("{field} must be a relative path inside the workspace: {value}"),
                    serde_json::json!({
                        "path": path.to_string_lossy(),
                        "field": field,
                        "value": value,
                    }),
                ));
            }
        }

        if self.context_lines > MAX_CONTEXT_LINES {
            return Err(UserError::config_invalid(
                format!(
                    "context_lines must be at most {MAX_CONTEXT_LINES} (got {})",
                    self.context_lines
                ),
                serde_json::json!({
                    "path": path.to_string_lossy(),
                    "field": "context_lines",
                }),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_error::error_code;

    #[test]
    fn missing_config_uses_defaults() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let cfg = Config::load(&tmp.path().join(CONFIG_FILENAME))?;
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.context_lines, 3);
        Ok(())
    }

    #[test]
    fn partial_config_fills_in_defaults() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "version: 1\ncomponents_dir: vendor/ui\n")?;

        let cfg = Config::load(&path)?;
        assert_eq!(cfg.components_dir, "vendor/ui");
        assert_eq!(cfg.patches_dir, ".patchstack/patches");
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join(CONFIG_FILENAME);
        let cfg = Config {
            context_lines: 5,
            ..Config::default()
        };
        cfg.save(&path)?;
        assert_eq!(Config::load(&path)?, cfg);
        Ok(())
    }

    #[test]
    fn escaping_paths_and_bad_versions_are_rejected() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join(CONFIG_FILENAME);

        std::fs::write(&path, "version: 1\npatches_dir: ../elsewhere\n")?;
        let err = Config::load(&path).unwrap_err();
        assert_eq!(error_code(&err), Some("E_CONFIG_INVALID"));

        std::fs::write(&path, "version: 9\n")?;
        let err = Config::load(&path).unwrap_err();
        assert_eq!(error_code(&err), Some("E_CONFIG_INVALID"));

        std::fs::write(&path, "components_dir: [\n")?;
        let err = Config::load(&path).unwrap_err();
        assert_eq!(error_code(&err), Some("E_CONFIG_INVALID"));
        Ok(())
    }
}
