mod cmd;
mod logging;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mdpress", version, about = "Compile a markdown vault into LaTeX documents and books")]
struct Cli {
    /// Configuration file (default: ./mdpress.toml, then ~/.config/mdpress/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile the vault: standalone documents and/or the book
    Build(BuildArgs),

    /// Resolve every reference and report problems without writing anything
    Check(CheckArgs),

    /// Validate configuration and print resolved paths
    Doctor,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Worker threads (default: `concurrency` from the config, else all cores)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Only write .tex files; do not run the LaTeX engine
    #[arg(long)]
    pub no_typeset: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Build(args) => cmd::build::run(cli.config.as_deref(), &args)?,
        Commands::Check(args) => cmd::check::run(cli.config.as_deref(), &args)?,
        Commands::Doctor => cmd::doctor::run(cli.config.as_deref()),
    };

    logging::flush();
    std::process::exit(code);
}
