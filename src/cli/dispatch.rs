use clap::Parser;

use super::args::*;
use super::human::print_user_error_human;
use super::json::print_anyhow_error;

use crate::paths::WorkspacePaths;

pub fn run() -> std::process::ExitCode {
    let cli = Cli::parse();
    crate::logging::init_tracing();
    match run_with(&cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            if cli.json {
                print_anyhow_error(&cli, &err);
            } else if !print_user_error_human(&err) {
                eprintln!("Error: {err:#}");
            }

            std::process::ExitCode::from(1)
        }
    }
}

fn run_with(cli: &Cli) -> anyhow::Result<()> {
    let (paths, config) = WorkspacePaths::load(cli.root.as_deref())?;
    let ctx = super::commands::Ctx {
        cli,
        paths: &paths,
        config: &config,
    };

    match &cli.command {
        Commands::Init => {
            super::commands::init::run(&ctx)?;
        }
        Commands::List => {
            super::commands::list::run(&ctx)?;
        }
        Commands::Show { patch_id } => {
            super::commands::show::run(&ctx, patch_id)?;
        }
        Commands::Check { patch_id } => {
            super::commands::check::run(&ctx, patch_id)?;
        }
        Commands::Apply { patch_id } => {
            super::commands::apply::run(&ctx, patch_id)?;
        }
        Commands::Create {
            component,
            target,
            from,
            to,
            id,
            patch_type,
            upstream_version,
            fragment_version,
            description,
            author,
            reason,
            depends_on,
            context_lines,
            apply,
        } => {
            let args = super::commands::create::CreateArgs {
                component,
                target,
                from: from.as_deref(),
                to: to.as_deref(),
                id: id.as_deref(),
                patch_type: *patch_type,
                upstream_version,
                fragment_version,
                description,
                author,
                reason,
                depends_on: depends_on.as_slice(),
                context_lines: *context_lines,
                apply: *apply,
            };
            super::commands::create::run(&ctx, &args)?;
        }
        Commands::Remove { patch_id } => {
            super::commands::remove::run(&ctx, patch_id)?;
        }
        Commands::Rebase { from, to, apply } => {
            super::commands::rebase::run_start(&ctx, from, to, *apply)?;
        }
        Commands::RebaseApply { rebase_id } => {
            super::commands::rebase::run_apply(&ctx, rebase_id)?;
        }
        Commands::Resolve {
            rebase_id,
            patch_id,
            resolution,
        } => {
            super::commands::rebase::run_resolve(&ctx, rebase_id, patch_id, *resolution)?;
        }
        Commands::History => {
            super::commands::history::run(&ctx)?;
        }
        Commands::Report => {
            super::commands::report::run(&ctx)?;
        }
    }

    Ok(())
}
