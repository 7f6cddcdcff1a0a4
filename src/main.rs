use anyhow::Result;
use backupd::cli::{Cli, Commands};
use backupd::output::{self, Verbosity};
use backupd::{BackupContext, commands};
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing(verbosity: Verbosity, daemon: bool) {
    let default = match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Verbose => "backupd=debug",
        Verbosity::Normal if daemon => "backupd=info",
        Verbosity::Normal => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    output::set_verbosity(verbosity);
    init_tracing(verbosity, matches!(cli.command, Commands::Watch { .. }));

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = BackupContext::new()?;
    ctx.override_paths(cli.db.as_deref(), cli.archive.as_deref());

    match cli.command {
        Commands::Add { paths } => commands::add::execute(&ctx, &paths)?,
        Commands::Remove { paths } => commands::remove::execute(&ctx, &paths)?,
        Commands::List => commands::list::execute(&ctx)?,
        Commands::Check => commands::check::execute(&ctx)?,
        Commands::Watch { interval } => {
            if let Some(secs) = interval {
                ctx.override_interval(secs)?;
            }
            commands::watch::execute(&ctx)?;
        }
        Commands::Completion { .. } => {}
    }

    Ok(())
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
