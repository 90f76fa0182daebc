use clap::{Parser, Subcommand};
use miette::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::{export, info, list, OpenArgs};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the children of a node
    List {
        #[command(flatten)]
        open: OpenArgs,

        /// Path inside the archive; the root when omitted
        #[arg(default_value = "")]
        path: String,

        /// How many levels to descend
        #[arg(short, long, default_value_t = 1)]
        depth: u32,
    },
    /// Describe a single node
    Info {
        #[command(flatten)]
        open: OpenArgs,

        /// Path inside the archive
        path: String,
    },
    /// Export a node: canvases as PNG, sounds as WAV/MP3, the rest as text
    Export {
        #[command(flatten)]
        open: OpenArgs,

        /// Path inside the archive
        path: String,

        /// Output file; derived from the node name when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<std::path::PathBuf>,
    },
}

fn main() -> Result<()> {
    better_panic::install();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    match &cli.command {
        Commands::List { open, path, depth } => list::run(open, path, *depth)?,
        Commands::Info { open, path } => info::run(open, path)?,
        Commands::Export { open, path, output } => export::run(open, path, output.as_deref())?,
    }

    Ok(())
}
