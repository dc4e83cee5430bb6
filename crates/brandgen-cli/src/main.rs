//! Brandgen CLI - generate and restyle brand imagery from job catalogs

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{catalogs, palette, run};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brandgen")]
#[command(about = "Brand imagery pipeline: describe, restyle and synthesize images", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the jobs of a catalog
    Run {
        /// Built-in catalog name, project catalog name, or path to a catalog TOML
        catalog: String,

        /// Run only the job with this key (regenerates even if the output exists)
        #[arg(long)]
        only: Option<String>,

        /// Regenerate outputs that already exist
        #[arg(long)]
        force: bool,

        /// Do not record outputs in the generation manifest
        #[arg(long)]
        no_manifest: bool,
    },

    /// List available catalogs and their job keys
    Catalogs,

    /// Print the dominant colors of an image
    Palette {
        /// Path to the image
        image: String,

        /// Number of colors to extract
        #[arg(long, default_value_t = 8)]
        colors: usize,
    },
}

fn main() -> Result<()> {
    // Secrets may live in .env.local; real environment variables win
    dotenvy::from_filename(".env.local").ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            catalog,
            only,
            force,
            no_manifest,
        } => run::run(run::RunArgs {
            catalog,
            only,
            force,
            no_manifest,
        }),
        Commands::Catalogs => catalogs::run(),
        Commands::Palette { image, colors } => palette::run(&image, colors),
    }
}
