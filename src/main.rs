//! ShapeClass - Main Entry Point
//!
//! KNN and K-Means classification of BDshape shape descriptors.

use clap::Parser;
use shapeclass::cli::{cmd_export, cmd_info, cmd_kmeans, cmd_knn, AppConfig, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shapeclass=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Knn { dataset, train_ratio, seed } => {
            cmd_knn(&dataset, train_ratio, seed, &config, cli.json)?;
        }
        Commands::Kmeans { dataset, k, restarts, random_init, seed } => {
            cmd_kmeans(&dataset, k, restarts, random_init, seed, &config, cli.json)?;
        }
        Commands::Info { dataset } => {
            cmd_info(&dataset, cli.json)?;
        }
        Commands::Export { dataset, output } => {
            cmd_export(&dataset, &output)?;
        }
    }

    Ok(())
}
