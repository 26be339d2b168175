use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;
use crate::controller::AppState;
use crate::controller::auth_controller::validate;
use crate::controller::current_user::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::models::parking_lot::ParkingLot;
use crate::models::parking_space::ParkingSpace;
use crate::models::reservation::Reservation;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    let postgres_repo = Arc::new(PostgresConnectionRepo::new(
        app_state.postgres_connection
    ));

    Router::new()
        .route("/", get(get_all_parking_spaces).post(add_parking_spaces))
        .route("/lot", get(get_parking_spaces_by_lot))
        .route("/space", get(retrieve_parking_space))
        .route("/overview", get(get_parking_lot_overview))
        .route_layer(Extension(postgres_repo))
}

pub async fn get_all_parking_spaces(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    _current_user: CurrentUser,
) -> impl IntoResponse {
    return match postgres_repo.retrieve_all_parking_spaces().await {
        Ok(parking_spaces) => {
            (StatusCode::OK, Json(parking_spaces)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving parking spaces due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ParkingLotParam {
    pub parking_lot_id: String,
}

pub async fn get_parking_spaces_by_lot(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    _current_user: CurrentUser,
    Query(query): Query<ParkingLotParam>,
) -> impl IntoResponse {
    let parking_spaces_res = postgres_repo
        .retrieve_parking_spaces_by_lot(
            &query.parking_lot_id
        ).await;

    return match parking_spaces_res {
        Ok(parking_spaces) => {
            (StatusCode::OK, Json(parking_spaces)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving spaces of parking lot: {}, due to: {}", query.parking_lot_id, e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GetParkingSpaceParam {
    pub id: String,
}

pub async fn retrieve_parking_space(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    _current_user: CurrentUser,
    Query(query): Query<GetParkingSpaceParam>,
) -> impl IntoResponse {
    return match postgres_repo.retrieve_parking_space(&query.id).await {
        Ok(Some(parking_space)) => {
            (StatusCode::OK, Json(parking_space)).into_response()
        }
        Ok(None) => {
            AppError::NotFound(format!("Parking space {}", query.id)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving parking space: {}, due to: {}", query.id, e);
            e.into_response()
        }
    };
}

/// Everything the parking spaces screen of a lot shows.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ParkingLotOverview {
    pub parking_lot: ParkingLot,
    pub parking_spaces: Vec<ParkingSpace>,
    pub reservations: Vec<Reservation>,
    pub user_reservations: Vec<Reservation>,
}

impl ParkingLotOverview {
    pub fn new(
        parking_lot: ParkingLot,
        mut parking_spaces: Vec<ParkingSpace>,
        reservations: Vec<Reservation>,
        user_id: &str,
    ) -> Self {
        parking_spaces.sort_by_key(|parking_space| parking_space.number);
        let user_reservations = reservations
            .iter()
            .filter(|reservation| reservation.user_id == user_id)
            .cloned()
            .collect();

        Self {
            parking_lot,
            parking_spaces,
            reservations,
            user_reservations,
        }
    }
}

async fn overview(
    postgres_repo: &PostgresConnectionRepo,
    parking_lot_id: &str,
    user_id: &str,
) -> AppResult<ParkingLotOverview> {
    let (parking_lot, parking_spaces, reservations) = futures::try_join!(
        postgres_repo.retrieve_parking_lot(parking_lot_id),
        postgres_repo.retrieve_parking_spaces_by_lot(parking_lot_id),
        postgres_repo.retrieve_parking_lot_reservations(parking_lot_id),
    )?;
    let parking_lot = parking_lot
        .ok_or_else(|| AppError::NotFound(format!("Parking lot {}", parking_lot_id)))?;

    Ok(ParkingLotOverview::new(parking_lot, parking_spaces, reservations, user_id))
}

pub async fn get_parking_lot_overview(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
    Query(query): Query<ParkingLotParam>,
) -> impl IntoResponse {
    return match overview(&postgres_repo, &query.parking_lot_id, &current_user.user.id).await {
        Ok(overview) => {
            (StatusCode::OK, Json(overview)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving overview of parking lot: {}, due to: {}", query.parking_lot_id, e);
            e.into_response()
        }
    };
}

#[derive(Clone, Serialize, Deserialize, Validate, Debug)]
pub struct AddParkingSpaces {
    #[validate(length(min = 1, message = "Parking lot is required"))]
    pub parking_lot_id: String,
    #[validate(range(min = 1, max = 500, message = "Between 1 and 500 parking spaces can be added at once"))]
    pub count: u32,
}

async fn add(
    postgres_repo: &PostgresConnectionRepo,
    current_user: &CurrentUser,
    body: &AddParkingSpaces,
) -> AppResult<Vec<ParkingSpace>> {
    current_user.require_admin()?;
    validate(body)?;

    postgres_repo
        .add_parking_spaces(&body.parking_lot_id, body.count)
        .await
}

pub async fn add_parking_spaces(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
    Json(body): Json<AddParkingSpaces>,
) -> impl IntoResponse {
    return match add(&postgres_repo, &current_user, &body).await {
        Ok(parking_spaces) => {
            info!("Added {} parking spaces to parking lot: {}", parking_spaces.len(), body.parking_lot_id);
            (StatusCode::CREATED, Json(parking_spaces)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong adding parking spaces to parking lot: {}, due to: {}", body.parking_lot_id, e);
            e.into_response()
        }
    };
}
