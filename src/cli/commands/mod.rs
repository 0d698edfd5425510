use crate::config::Config;
use crate::paths::WorkspacePaths;
use crate::storage::FsStorage;

use super::args::Cli;

pub(crate) mod apply;
pub(crate) mod check;
pub(crate) mod create;
pub(crate) mod history;
pub(crate) mod init;
pub(crate) mod list;
pub(crate) mod rebase;
pub(crate) mod remove;
pub(crate) mod report;
pub(crate) mod show;

pub(crate) struct Ctx<'a> {
    pub(crate) cli: &'a Cli,
    pub(crate) paths: &'a WorkspacePaths,
    pub(crate) config: &'a Config,
}

/// Filesystem stores backing one command invocation.
pub(crate) struct Stores {
    pub(crate) patches: FsStorage,
    pub(crate) components: FsStorage,
    /// Workspace root; holds the rebase history file.
    pub(crate) workspace: FsStorage,
}

impl Ctx<'_> {
    pub(crate) fn stores(&self) -> Stores {
        Stores {
            patches: FsStorage::new(&self.paths.patches_dir),
            components: FsStorage::new(&self.paths.components_dir),
            workspace: FsStorage::new(&self.paths.root),
        }
    }
}
