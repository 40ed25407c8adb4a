use anyhow::Result;
use clap::{Parser, Subcommand};
use dblp_toc::{fetch, links};

#[derive(Parser)]
#[command(name = "dblp-toc")]
#[command(about = "Build an offline conference author dataset from dblp TOCs, then link authors to profiles")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download per-year TOC records from dblp and aggregate author metrics
    Fetch(fetch::FetchArgs),
    /// Build author profile links from a dataset and CSRankings CSV files
    Links(links::LinksArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    match cli.command {
        Commands::Fetch(args) => fetch::run(args),
        Commands::Links(args) => links::run(args),
    }
}
