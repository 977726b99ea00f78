//! CLI command definitions.

use clap::{Parser, Subcommand};
use darkroom::VariantSize;
use std::path::PathBuf;

/// Darkroom - photo ingestion and asynchronous variant derivation
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(about = "Photo ingestion and asynchronous variant derivation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./darkroom.toml when present)
    #[arg(short, long, global = true, env = "DARKROOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume the work queue and derive variants until Ctrl-C
    Worker,

    /// Store an original and queue it for derivation
    Upload {
        /// Image file to upload
        file: PathBuf,

        /// Owning business
        #[arg(long)]
        business_id: String,

        /// Optional caption
        #[arg(long)]
        caption: Option<String>,

        /// MIME type; guessed from the file extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print a photo's record and metadata document as JSON
    Show {
        /// Photo id
        id: String,
    },

    /// List a business's photos with their media paths
    List {
        /// Owning business
        #[arg(long)]
        business_id: String,
    },

    /// Download one rendition of a photo
    Fetch {
        /// Photo id
        id: String,

        /// Rendition: orig, 1024, 640, 256 or 128
        #[arg(value_parser = parse_size)]
        size: VariantSize,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn parse_size(s: &str) -> Result<VariantSize, String> {
    s.parse::<VariantSize>()
}
