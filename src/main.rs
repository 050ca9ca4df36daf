extern crate log;
pub mod api;
pub mod business;
pub mod config;
pub mod crs;
pub mod error;
pub mod layer;
pub mod server;
pub mod store;
use crate::api::Api;
use crate::config::Config;
use crate::store::gdal_store::GdalStore;
use crate::store::{AccessMode, SpatialStore};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

/// Serve map layers and the business dataset as GeoJSON over HTTP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: PathBuf,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = Config::from_file(&args.config_filepath)?;
    log::info!("Using {:?}", config.datasource);

    let store = GdalStore::new(&config.datasource);
    // Fail at startup rather than on the first request.
    store
        .connect(AccessMode::ReadOnly)
        .with_context(|| format!("Connecting to {:?}", config.datasource))?;

    let api = Api::new(store, config.layer_catalog()?, config.business_table()?);
    log::info!(
        "Serving layers {:?}, business table {}",
        config.layers,
        config.business_table
    );
    server::serve(api, &config.listen_address, config.static_dir.clone())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
