use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use mindsift::notes::Category;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, notes.json and downloaded models.
    /// Defaults to $MINDSIFT_BASE_PATH or ~/.local/share/mindsift
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ProviderArgs {
    /// Use deterministic synthetic embeddings and their thresholds
    /// instead of the on-device model
    #[clap(long, default_value = "false")]
    pub synthetic: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank notes against a query
    Search {
        /// Free-text query. Empty lists every note
        #[clap(allow_hyphen_values = true, default_value = "")]
        query: String,

        /// Only search notes of this category
        #[clap(short, long)]
        category: Option<Category>,

        #[clap(flatten)]
        provider: ProviderArgs,
    },

    /// Run the layout simulation and print positions and edges
    Layout {
        #[clap(long, default_value = "800")]
        width: f64,

        #[clap(long, default_value = "600")]
        height: f64,

        /// Override layout.tick_count
        #[clap(long)]
        ticks: Option<usize>,

        /// Print every tick as a JSON line
        #[clap(long, default_value = "false")]
        stream: bool,

        /// Jitter seed, for reproducible layouts
        #[clap(long)]
        seed: Option<u64>,

        #[clap(flatten)]
        provider: ProviderArgs,
    },

    /// Compute missing or stale note embeddings
    Embed {
        #[clap(flatten)]
        provider: ProviderArgs,
    },
}
