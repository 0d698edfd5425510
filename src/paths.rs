use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::config::{CONFIG_FILENAME, Config};
use crate::storage::join_posix;

pub const ROOT_ENV: &str = "PATCHSTACK_ROOT";

/// Resolved locations of everything patchstack reads and writes.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub components_dir: PathBuf,
    pub patches_dir: PathBuf,
    /// History location relative to `root`, used as a storage key.
    pub history_key: String,
}

impl WorkspacePaths {
    /// Root precedence: explicit override, then `$PATCHSTACK_ROOT`, then the current directory.
    pub fn resolve_root(root_override: Option<&Path>) -> anyhow::Result<PathBuf> {
        if let Some(root) = root_override {
            return Ok(root.to_path_buf());
        }
        if let Ok(val) = std::env::var(ROOT_ENV) {
            if !val.trim().is_empty() {
                return expand_tilde(&val);
            }
        }
        std::env::current_dir().context("resolve current directory")
    }

    pub fn load(root_override: Option<&Path>) -> anyhow::Result<(Self, Config)> {
        let root = Self::resolve_root(root_override)?;
        let config_path = root.join(CONFIG_FILENAME);
        let config = Config::load(&config_path)?;
        Ok((Self::from_config(root, &config), config))
    }

    pub fn from_config(root: PathBuf, config: &Config) -> Self {
        Self {
            config_path: root.join(CONFIG_FILENAME),
            components_dir: join_posix(&root, &config.components_dir),
            patches_dir: join_posix(&root, &config.patches_dir),
            history_key: config.history_file.clone(),
            root,
        }
    }
}

fn expand_tilde(s: &str) -> anyhow::Result<PathBuf> {
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().context("resolve home dir")?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(s))
}
