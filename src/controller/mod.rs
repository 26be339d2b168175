use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use bb8_postgres::bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::NoTls;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::info;
use crate::config::Config;
use crate::helpers::handler_404::page_not_found_handler;
use crate::repositories::places_api::PlacesApiClient;

pub mod auth_controller;
pub mod current_user;
pub mod health_check;
pub mod parking_lot_controller;
pub mod parking_space_controller;
pub mod places_controller;
pub mod reservation_controller;
pub mod user_controller;

/// Requests handled at once, the rest wait for a slot.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

#[derive(Clone)]
pub struct AppState {
    pub postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
    pub places_api: Arc<PlacesApiClient>,
}

pub async fn serve(
    app_state: AppState,
    config: &Config,
) -> anyhow::Result<()> {
    let application = application(app_state, config)?;

    let port = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("API server listening on port: {}", port);
    axum::Server::bind(&port)
        .serve(application.into_make_service())
        .await
        .context("Error spinning up the API server")
}

pub fn application(
    app_state: AppState,
    config: &Config,
) -> anyhow::Result<Router> {
    let origins = config
        .origin_urls
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HeaderValue>().with_context(|| format!("Invalid origin url: {}", s)))
        .collect::<anyhow::Result<Vec<HeaderValue>>>()?;

    Ok(router_endpoints(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS
                        ])
                        .allow_origin(origins)
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                )
        )
        .fallback(page_not_found_handler))
}

pub fn router_endpoints(app_state: AppState) -> Router {
    health_check::router()
        .nest("/auth", auth_controller::router(app_state.clone()))
        .nest("/users", user_controller::router(app_state.clone()))
        .nest("/parking-lots", parking_lot_controller::router(app_state.clone()))
        .nest("/parking-spaces", parking_space_controller::router(app_state.clone()))
        .nest("/reservations", reservation_controller::router(app_state.clone()))
        .nest("/places", places_controller::router(app_state))
}
