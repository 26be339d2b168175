use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;
use crate::controller::AppState;
use crate::controller::auth_controller::validate;
use crate::controller::current_user::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::helpers::geo;
use crate::models::location::Location;
use crate::models::parking_lot::{NearbyParkingLot, ParkingLot};
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 5.0;

pub fn router(app_state: AppState) -> Router {
    let postgres_repo = Arc::new(PostgresConnectionRepo::new(
        app_state.postgres_connection
    ));

    Router::new()
        .route("/", get(get_all_parking_lots).post(add_parking_lot))
        .route("/lot", get(retrieve_parking_lot))
        .route("/search", get(search_parking_lots))
        .route("/nearby", get(get_nearby_parking_lots))
        .route_layer(Extension(postgres_repo))
}

pub async fn get_all_parking_lots(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
) -> impl IntoResponse {
    return match postgres_repo.retrieve_all_parking_lots().await {
        Ok(parking_lots) => {
            (StatusCode::OK, Json(parking_lots)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving parking lots due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GetParkingLotParam {
    pub id: String,
}

pub async fn retrieve_parking_lot(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Query(query): Query<GetParkingLotParam>,
) -> impl IntoResponse {
    let parking_lot_res = postgres_repo
        .retrieve_parking_lot(
            &query.id
        ).await;

    return match parking_lot_res {
        Ok(Some(parking_lot)) => {
            (StatusCode::OK, Json(parking_lot)).into_response()
        }
        Ok(None) => {
            AppError::NotFound(format!("Parking lot {}", query.id)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving parking lot: {}, due to: {}", query.id, e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct SearchParkingLotParam {
    pub name: Option<String>,
    pub city: Option<String>,
}

pub enum ParkingLotSearch {
    ByName(String),
    ByCity(String),
}

impl SearchParkingLotParam {
    /// Name wins when both are given; blank terms count as absent.
    pub fn search(self) -> AppResult<ParkingLotSearch> {
        let non_blank = |term: Option<String>| term.filter(|term| !term.trim().is_empty());

        match (non_blank(self.name), non_blank(self.city)) {
            (Some(name), _) => Ok(ParkingLotSearch::ByName(name)),
            (None, Some(city)) => Ok(ParkingLotSearch::ByCity(city)),
            (None, None) => Err(AppError::Validation("Search needs a name or a city".into())),
        }
    }
}

async fn search(
    postgres_repo: &PostgresConnectionRepo,
    query: SearchParkingLotParam,
) -> AppResult<Vec<ParkingLot>> {
    match query.search()? {
        ParkingLotSearch::ByName(name) => postgres_repo.search_parking_lots_by_name(&name).await,
        ParkingLotSearch::ByCity(city) => postgres_repo.search_parking_lots_by_city(&city).await,
    }
}

pub async fn search_parking_lots(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Query(query): Query<SearchParkingLotParam>,
) -> impl IntoResponse {
    return match search(&postgres_repo, query).await {
        Ok(parking_lots) => {
            (StatusCode::OK, Json(parking_lots)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong searching for parking lots due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct NearbyParkingLotParam {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

async fn nearby(
    postgres_repo: &PostgresConnectionRepo,
    query: NearbyParkingLotParam,
) -> AppResult<Vec<NearbyParkingLot>> {
    let origin = Location {
        latitude: query.latitude,
        longitude: query.longitude,
    };
    if !geo::is_valid(origin) {
        return Err(AppError::Validation(format!(
            "Coordinates ({}, {}) are out of range",
            origin.latitude, origin.longitude
        )));
    }

    let radius_km = query.radius_km.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::Validation("Radius must be a positive number of kilometers".into()));
    }

    let parking_lots = postgres_repo.retrieve_all_parking_lots().await?;
    Ok(geo::nearby(parking_lots, origin, radius_km))
}

pub async fn get_nearby_parking_lots(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Query(query): Query<NearbyParkingLotParam>,
) -> impl IntoResponse {
    return match nearby(&postgres_repo, query).await {
        Ok(parking_lots) => {
            (StatusCode::OK, Json(parking_lots)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving nearby parking lots due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Validate, Debug)]
pub struct AddParkingLot {
    #[validate(length(min = 1, message = "Parking lot name is required"))]
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl AddParkingLot {
    pub fn into_parking_lot(self) -> AppResult<ParkingLot> {
        let body = AddParkingLot {
            name: self.name.trim().to_string(),
            country: self.country.trim().to_string(),
            city: self.city.trim().to_string(),
            ..self
        };
        validate(&body)?;

        let location = Location {
            latitude: body.latitude,
            longitude: body.longitude,
        };
        if !geo::is_valid(location) {
            return Err(AppError::Validation(format!(
                "Coordinates ({}, {}) are out of range",
                location.latitude, location.longitude
            )));
        }

        Ok(ParkingLot {
            id: Uuid::new_v4().to_string(),
            name: body.name,
            country: body.country,
            city: body.city,
            latitude: body.latitude,
            longitude: body.longitude,
        })
    }
}

async fn add(
    postgres_repo: &PostgresConnectionRepo,
    current_user: &CurrentUser,
    body: AddParkingLot,
) -> AppResult<ParkingLot> {
    current_user.require_admin()?;

    let parking_lot = body.into_parking_lot()?;
    postgres_repo.add_parking_lot(&parking_lot).await?;
    info!("User: {} added parking lot: {}", current_user.user.id, parking_lot.id);
    Ok(parking_lot)
}

pub async fn add_parking_lot(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
    Json(body): Json<AddParkingLot>,
) -> impl IntoResponse {
    return match add(&postgres_repo, &current_user, body).await {
        Ok(parking_lot) => {
            (StatusCode::CREATED, Json(parking_lot)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong adding parking lot due to: {}", e);
            e.into_response()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_prefers_name_over_city() {
        let query = SearchParkingLotParam {
            name: Some("Centro".into()),
            city: Some("Medellin".into()),
        };
        assert!(matches!(query.search(), Ok(ParkingLotSearch::ByName(name)) if name == "Centro"));

        let query = SearchParkingLotParam {
            name: Some("  ".into()),
            city: Some("Medellin".into()),
        };
        assert!(matches!(query.search(), Ok(ParkingLotSearch::ByCity(city)) if city == "Medellin"));
    }

    #[test]
    fn search_without_terms_is_rejected() {
        assert!(matches!(
            SearchParkingLotParam::default().search(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn new_parking_lot_is_trimmed_and_validated() {
        let parking_lot = AddParkingLot {
            name: " Parqueadero Centro ".into(),
            country: "Colombia".into(),
            city: " Medellin".into(),
            latitude: 6.2442,
            longitude: -75.5812,
        }
        .into_parking_lot()
        .unwrap();

        assert_eq!(parking_lot.name, "Parqueadero Centro");
        assert_eq!(parking_lot.city, "Medellin");
        assert!(!parking_lot.id.is_empty());
    }

    #[test]
    fn new_parking_lot_needs_name_and_sane_coordinates() {
        let unnamed = AddParkingLot {
            name: "  ".into(),
            country: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
        };
        assert!(matches!(unnamed.into_parking_lot(), Err(AppError::Validation(_))));

        let off_the_map = AddParkingLot {
            name: "Lot".into(),
            country: String::new(),
            city: String::new(),
            latitude: 120.0,
            longitude: 0.0,
        };
        assert!(matches!(off_the_map.into_parking_lot(), Err(AppError::Validation(_))));
    }
}
