//! Release tasks for backupd: man pages, shell completions and a sample
//! configuration, all generated from the library's own definitions.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "xtask", about = "Release tasks for backupd")]
enum Task {
    /// Render backupd.1 plus one page per subcommand
    ManPages {
        #[arg(short, long, default_value = "dist/man")]
        output: PathBuf,
    },
    /// Write completion scripts for every supported shell
    Completions {
        #[arg(short, long, default_value = "dist/completions")]
        output: PathBuf,
    },
    /// Write the default config.toml with every setting spelled out
    SampleConfig {
        #[arg(short, long, default_value = "dist/config.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    match Task::parse() {
        Task::ManPages { output } => man_pages(&output),
        Task::Completions { output } => completions(&output),
        Task::SampleConfig { output } => sample_config(&output),
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn man_pages(output_dir: &Path) -> Result<()> {
    create_dir(output_dir)?;
    let cmd = backupd::cli::Cli::command();
    render_man(&cmd, "backupd", output_dir)?;

    // Completion scripts ship through the `completions` task instead
    for sub in cmd
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set() && sub.get_name() != "completion")
    {
        render_man(sub, &format!("backupd-{}", sub.get_name()), output_dir)?;
    }

    println!("Man pages written to {}", output_dir.display());
    Ok(())
}

fn render_man(cmd: &clap::Command, title: &str, output_dir: &Path) -> Result<()> {
    let path = output_dir.join(format!("{title}.1"));
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create man page: {}", path.display()))?;
    clap_mangen::Man::new(cmd.clone())
        .title(title.to_uppercase())
        .render(&mut std::io::BufWriter::new(file))?;
    println!("  {}", path.display());
    Ok(())
}

fn completions(output_dir: &Path) -> Result<()> {
    create_dir(output_dir)?;
    let mut cmd = backupd::cli::Cli::command();
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::Elvish, Shell::PowerShell] {
        let path = clap_complete::generate_to(shell, &mut cmd, "backupd", output_dir)
            .with_context(|| format!("Failed to write {shell} completions"))?;
        println!("  {}", path.display());
    }
    Ok(())
}

fn sample_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    backupd::config::Config::default().save(path)?;
    println!("Sample configuration written to {}", path.display());
    Ok(())
}
