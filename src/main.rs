mod cli;
mod commands;
mod engine;
mod paths;
mod progress;
mod resource;
mod schema;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ShowCommand};
use commands::declarative::ConvergeFlags;
use commands::inspect::ShowTarget;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Manifest given with `--config`
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Status(args) => commands::declarative::status(&ctx, args.target.as_deref()),
        Command::Diff(args) => commands::declarative::diff(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::declarative::apply(
            &ctx,
            args.target.as_deref(),
            ConvergeFlags {
                dry_run: args.dry_run,
                yes: args.yes,
                keep_going: args.keep_going,
            },
        ),
        Command::Destroy(args) => commands::declarative::destroy(
            &ctx,
            args.target.as_deref(),
            ConvergeFlags {
                dry_run: args.dry_run,
                yes: args.yes,
                keep_going: args.keep_going,
            },
        ),
        Command::Show(cmd) => match cmd {
            ShowCommand::Database { name, json } => {
                commands::inspect::show(&ctx, ShowTarget::Database(&name), json)
            }
            ShowCommand::Login { name, json } => {
                commands::inspect::show(&ctx, ShowTarget::Login(&name), json)
            }
            ShowCommand::User {
                database,
                name,
                json,
            } => commands::inspect::show(
                &ctx,
                ShowTarget::User {
                    database: &database,
                    name: &name,
                },
                json,
            ),
        },
        Command::Server => commands::inspect::server(&ctx),
        Command::Validate => commands::validate::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sqlconverge", &mut io::stdout());
            Ok(())
        }
    }
}
