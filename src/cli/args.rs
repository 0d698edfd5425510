use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::patch::{PatchType, Resolution};

#[derive(Parser, Debug)]
#[command(name = "patchstack")]
#[command(about = "Local patches on vendored component sources, with drift checks and rebase", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Workspace root (default: $PATCHSTACK_ROOT, then the current directory)
    #[arg(long, global = true)]
    pub(crate) root: Option<PathBuf>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub(crate) json: bool,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default patchstack.yaml and create the workspace directories
    Init,

    /// List all patches
    List,

    /// Print one patch document
    Show { patch_id: String },

    /// Dry run: check whether a patch still applies (exit 1 if not)
    Check { patch_id: String },

    /// Apply one patch to its target file (all-or-nothing)
    Apply { patch_id: String },

    /// Record a new patch from an upstream and a modified revision of a file
    Create {
        /// Component the target file belongs to
        component: String,

        /// Target file, relative to the component source root
        target: String,

        /// Upstream revision of the file (default: the file under the components dir, or empty)
        #[arg(long)]
        from: Option<PathBuf>,

        /// Modified revision of the file (default: empty)
        #[arg(long)]
        to: Option<PathBuf>,

        /// Explicit patch id (default: derived from component, target and time)
        #[arg(long)]
        id: Option<String>,

        #[arg(long, value_enum, default_value_t = PatchType::Modify)]
        patch_type: PatchType,

        #[arg(long, default_value = "")]
        upstream_version: String,

        #[arg(long, default_value = "")]
        fragment_version: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, env = "PATCHSTACK_AUTHOR", default_value = "")]
        author: String,

        /// Why the customization exists
        #[arg(long, default_value = "")]
        reason: String,

        /// Comma-separated ids of patches that must be applied first
        #[arg(long, value_delimiter = ',')]
        depends_on: Vec<String>,

        /// Context lines captured around each edit (default: from patchstack.yaml)
        #[arg(long)]
        context_lines: Option<usize>,

        /// Also apply the new patch to the component sources
        #[arg(long)]
        apply: bool,
    },

    /// Delete a patch from the store
    Remove { patch_id: String },

    /// Start a rebase from one upstream version to another and report conflicts
    Rebase {
        from: String,
        to: String,

        /// Apply the patch set right away when no conflicts were found
        #[arg(long)]
        apply: bool,
    },

    /// Apply the patch set of a started rebase (identified by its from-version)
    RebaseApply { rebase_id: String },

    /// Record how the conflicts of one patch in a pending rebase are handled
    Resolve {
        rebase_id: String,
        patch_id: String,
        #[arg(value_enum)]
        resolution: Resolution,
    },

    /// Show the rebase history
    History,

    /// Print the patch and rebase report
    Report,
}

impl Cli {
    pub(crate) fn command_name(&self) -> String {
        match &self.command {
            Commands::Init => "init",
            Commands::List => "list",
            Commands::Show { .. } => "show",
            Commands::Check { .. } => "check",
            Commands::Apply { .. } => "apply",
            Commands::Create { .. } => "create",
            Commands::Remove { .. } => "remove",
            Commands::Rebase { .. } => "rebase",
            Commands::RebaseApply { .. } => "rebase-apply",
            Commands::Resolve { .. } => "resolve",
            Commands::History => "history",
            Commands::Report => "report",
        }
        .to_string()
    }
}
