//! Darkroom CLI binary.
//!
//! This binary provides command-line access to Darkroom:
//! - Run the variant derivation worker
//! - Upload originals and queue them for derivation
//! - Inspect photos and fetch their renditions

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, fetch, list, print_config, show, upload, work};

    // Pick up DARKROOM_* overrides from a local .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    darkroom::init_tracing(cli.verbose, cli.json_logs)?;

    let config = darkroom::WorkerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Worker => work(&config).await?,
        Commands::Upload {
            file,
            business_id,
            caption,
            content_type,
        } => upload(&config, &file, business_id, caption, content_type).await?,
        Commands::Show { id } => show(&config, &id).await?,
        Commands::List { business_id } => list(&config, &business_id).await?,
        Commands::Fetch { id, size, output } => {
            fetch(&config, &id, size, output.as_deref()).await?
        }
        Commands::Config => print_config(&config)?,
    }

    Ok(())
}
