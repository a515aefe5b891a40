use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::build::DEFAULT_BATCH_SIZE;

#[derive(Parser, Debug)]
#[command(version, about = "Find movie critiques similar to yours", long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, data/ and models/
    #[clap(long, env = "CRITIQUES_BASE_PATH", default_value = ".")]
    pub base_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Clean a raw review export into a records CSV
    Preprocess {
        /// Raw CSV with a `review_content` column
        #[clap(short, long)]
        input: PathBuf,

        /// Output CSV, defaults to data/<input>_clean.csv
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Embed a corpus and write its index
    Build {
        /// Configured corpus to build
        #[clap(short, long, required_unless_present = "clean_csv")]
        corpus: Option<String>,

        /// Build from this records CSV instead; the corpus is named after the file
        #[clap(long, conflicts_with = "corpus")]
        clean_csv: Option<PathBuf>,

        /// Records embedded per model call
        #[clap(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Print critiques similar to a text as JSON
    Query {
        /// Corpus to search, defaults to the configured one
        #[clap(short, long)]
        corpus: Option<String>,

        /// Your critique
        #[clap(short, long)]
        text: String,

        #[clap(short, long, default_value = "1")]
        page: NonZeroUsize,

        /// Defaults to the configured page size
        #[clap(long)]
        per_page: Option<NonZeroUsize>,

        /// Keep only the N most similar critiques
        #[clap(short, long)]
        limit: Option<NonZeroUsize>,
    },

    /// Serve the web UI and JSON API
    Serve {
        /// Address to listen on, overrides server.listen
        #[clap(long)]
        listen: Option<String>,
    },
}
