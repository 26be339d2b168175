use std::sync::Arc;
use anyhow::Context;
use bb8_postgres::bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::NoTls;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use crate::config::Config;
use crate::controller::AppState;
use crate::repositories::places_api::PlacesApiClient;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub mod config;
pub mod controller;
pub mod error;
pub mod helpers;
pub mod models;
pub mod repositories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    info!(
        "Starting park easy backend in environment: {}, production: {}",
        config.environment,
        config.is_production()
    );

    let manager = PostgresConnectionManager::new_from_stringlike(&config.database_url, NoTls)
        .context("Invalid database url")?;
    let postgres_connection = Pool::builder()
        .max_size((num_cpus::get() * 2) as u32)
        .build(manager)
        .await
        .context("Unable to build the postgres connection pool")?;

    PostgresConnectionRepo::new(postgres_connection.clone())
        .ensure_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Unable to prepare the database schema: {}", e))?;

    let app_state = AppState {
        postgres_connection,
        places_api: Arc::new(PlacesApiClient::new(&config)?),
    };

    controller::serve(app_state, &config).await
}
