//! Database administration: migrations and demo data.

use clap::{Parser, Subcommand};
use garage_sale::{
    core::schema,
    infra::{config::load_config, database::init_db, logging::init_logging},
};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every pending schema migration
    Migrate,
    /// Insert the demo products
    Seed,
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let args = Args::parse();
    dotenvy::dotenv().ok();
    let _guard = init_logging();

    let config = load_config()?;
    let db = init_db(&config.database)?;

    let result = match args.command {
        Command::Migrate => schema::migrate(&db).await.map(|()| "Migrations complete"),
        Command::Seed => schema::seed(&db).await.map(|()| "Seed data inserted"),
    };
    db.close().await;

    match result {
        Ok(done) => {
            tracing::info!("{}", done);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
