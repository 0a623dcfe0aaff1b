pub mod config;
pub mod data;
pub mod datasets;
pub mod filter;
pub mod map;
pub mod page;
pub mod params;
pub mod server;
pub mod types;
pub mod viewport;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the map page, its API and the boundary files
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Resolve a query string the way the page would and print the result
    Inspect {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// e.g. "country=nepal&province=province3"
        #[arg(default_value = "")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let catalog = Arc::new(datasets::Catalog::builtin());

    match &cli.command {
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            server::start_server(app_config, catalog).await?;
        }
        Commands::Inspect { config, query } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let store = data::BoundaryStore::new(&app_config.assets.boundary_dir);

            let sync = params::ParamSync::from_query(query);
            let panel = filter::FilterPanel::from_selection(catalog.clone(), &sync.selection());
            let snapshot = panel.snapshot();

            let mut service = map::MapService::new(app_config.map.clone(), catalog);
            service.map();
            service.follow(&snapshot, &store).await;

            let report = json!({
                "query": params::encode(&sync.selection())?,
                "filter": snapshot,
                "options": panel.options(),
                "map": service.view(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
