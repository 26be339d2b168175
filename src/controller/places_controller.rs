use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::controller::AppState;
use crate::repositories::places_api::PlacesApiClient;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/countries", get(get_all_countries))
        .route("/states", get(get_all_states_by_country))
        .route("/cities", get(get_all_cities_by_state))
        .route_layer(Extension(app_state.places_api))
}

pub async fn get_all_countries(
    Extension(places_api): Extension<Arc<PlacesApiClient>>,
) -> impl IntoResponse {
    return match places_api.get_all_countries().await {
        Ok(countries) => {
            (StatusCode::OK, Json(countries)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving countries due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StatesParam {
    pub country: String,
}

pub async fn get_all_states_by_country(
    Extension(places_api): Extension<Arc<PlacesApiClient>>,
    Query(query): Query<StatesParam>,
) -> impl IntoResponse {
    return match places_api.get_all_states_by_country(&query.country).await {
        Ok(states) => {
            (StatusCode::OK, Json(states)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving states of: {}, due to: {}", query.country, e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CitiesParam {
    pub state: String,
}

pub async fn get_all_cities_by_state(
    Extension(places_api): Extension<Arc<PlacesApiClient>>,
    Query(query): Query<CitiesParam>,
) -> impl IntoResponse {
    return match places_api.get_all_cities_by_state(&query.state).await {
        Ok(cities) => {
            (StatusCode::OK, Json(cities)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving cities of: {}, due to: {}", query.state, e);
            e.into_response()
        }
    };
}
