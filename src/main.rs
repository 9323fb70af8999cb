mod app;
mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod progress;
mod runner;
mod scanner;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
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
    };

    match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rani", &mut io::stdout());
            Ok(())
        }
        command => run(&ctx, command).await,
    }
}

async fn run(ctx: &Context, command: Command) -> Result<()> {
    log::debug!("Running with verbosity {}", ctx.verbose);
    let app = commands::load(ctx).await?;

    match command {
        Command::Status { kind } => commands::status::run(ctx, &app, kind),
        Command::Toggle { kind, name, aur } => commands::toggle::toggle(&app, kind, &name, aur),
        Command::Reset { kind, name } => commands::toggle::reset(&app, kind, name.as_deref()),
        Command::Set(cmd) => commands::toggle::set(&app, cmd),
        Command::Tasks => {
            commands::tasks::run(&app);
            Ok(())
        }
        Command::Apply(args) => commands::apply::apply(ctx, &app, &args).await,
        Command::Ensure { package } => commands::apply::ensure(ctx, &app, &package).await,
        Command::Run {
            script,
            privileged,
            name,
        } => commands::apply::run(ctx, &app, &script, privileged, &name).await,
        Command::Scan => commands::apply::scan(&app),
        Command::Completions { .. } => Ok(()),
    }
}
