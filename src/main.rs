//! Serves the product list over HTTP.

use garage_sale::{
    app::run_app,
    core::product::product_repository::{DynProductStore, PgProductStore},
    infra::{
        config::load_config,
        database::init_db,
        lifecycle::{shutdown_signal, Shutdown},
        logging::init_logging,
    },
};
use std::{process::ExitCode, sync::Arc};

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let _guard = init_logging();
    tracing::info!("Started");
    // Registered before binding so a SIGTERM during startup still drains.
    let shutdown = shutdown_signal();

    let config = load_config()?;
    let db = init_db(&config.database)?;
    let products: DynProductStore = Arc::new(PgProductStore::new(db.clone()));

    let code = match run_app(&config, products, shutdown).await {
        Ok(Shutdown::Graceful) => {
            db.close().await;
            ExitCode::SUCCESS
        }
        // Connections still held by aborted requests would keep `close` waiting.
        Ok(Shutdown::Forced) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    };

    tracing::info!("Completed");
    Ok(code)
}
