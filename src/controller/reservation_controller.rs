use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use crate::controller::AppState;
use crate::controller::current_user::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::helpers::availability::validate_window;
use crate::helpers::reservation_window::{ReservationWindow, WindowSelection};
use crate::models::reservation::{NewReservation, Reservation, TimeWindow};
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    let postgres_repo = Arc::new(PostgresConnectionRepo::new(
        app_state.postgres_connection
    ));

    Router::new()
        .route("/", get(get_user_reservations).post(add_reservation).delete(delete_reservation))
        .route("/lot", get(get_parking_lot_reservations))
        .route("/availability", post(check_availability))
        .route_layer(Extension(postgres_repo))
}

pub async fn get_user_reservations(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
) -> impl IntoResponse {
    let user_reservations_res = postgres_repo
        .retrieve_user_reservations(
            &current_user.user.id
        ).await;

    return match user_reservations_res {
        Ok(reservations) => {
            (StatusCode::OK, Json(reservations)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving user's reservations due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ParkingLotReservationsQuery {
    pub parking_lot_id: String,
}

pub async fn get_parking_lot_reservations(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    _current_user: CurrentUser,
    Query(query): Query<ParkingLotReservationsQuery>,
) -> impl IntoResponse {
    let reservations_res = postgres_repo
        .retrieve_parking_lot_reservations(
            &query.parking_lot_id
        ).await;

    return match reservations_res {
        Ok(reservations) => {
            (StatusCode::OK, Json(reservations)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong retrieving reservations of parking lot: {}, due to: {}", query.parking_lot_id, e);
            e.into_response()
        }
    };
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckAvailability {
    pub parking_space_id: String,
    #[serde(flatten)]
    pub selection: WindowSelection,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Availability {
    pub available: bool,
    #[serde(flatten)]
    pub window: ReservationWindow,
    /// Present when the window is free, to be echoed back when reserving.
    pub reservation: Option<ReserveParkingSpaceTemplate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReserveParkingSpaceTemplate {
    pub parking_space_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
}

async fn availability(
    postgres_repo: &PostgresConnectionRepo,
    body: CheckAvailability,
) -> AppResult<Availability> {
    let window = body.selection.resolve()?;
    validate_window(&window.window)?;

    if postgres_repo.retrieve_parking_space(&body.parking_space_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Parking space {}", body.parking_space_id)));
    }

    let available = postgres_repo
        .check_availability(&body.parking_space_id, &window.window)
        .await?;
    debug!(
        "Parking space: {} available from {} to {}: {}",
        body.parking_space_id, window.start_text, window.end_text, available
    );

    let reservation = available.then(|| ReserveParkingSpaceTemplate {
        parking_space_id: body.parking_space_id.clone(),
        start_timestamp: window.window.start,
        end_timestamp: window.window.end,
    });

    Ok(Availability {
        available,
        window,
        reservation,
    })
}

pub async fn check_availability(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    _current_user: CurrentUser,
    Json(body): Json<CheckAvailability>,
) -> impl IntoResponse {
    return match availability(&postgres_repo, body).await {
        Ok(availability) => {
            (StatusCode::OK, Json(availability)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong checking parking space availability due to: {}", e);
            e.into_response()
        }
    };
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReserveParkingSpace {
    pub parking_lot_id: String,
    pub parking_space_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_timestamp: OffsetDateTime,
}

impl ReserveParkingSpace {
    pub fn for_user(self, user_id: &str) -> AppResult<NewReservation> {
        let window = TimeWindow {
            start: self.start_timestamp,
            end: self.end_timestamp,
        };
        validate_window(&window)?;

        Ok(NewReservation {
            user_id: user_id.to_string(),
            parking_lot_id: self.parking_lot_id,
            parking_space_id: self.parking_space_id,
            window,
        })
    }
}

async fn reserve(
    postgres_repo: &PostgresConnectionRepo,
    current_user: &CurrentUser,
    body: ReserveParkingSpace,
) -> AppResult<Reservation> {
    let new_reservation = body.for_user(&current_user.user.id)?;
    let reservation = postgres_repo.add_reservation(new_reservation).await?;

    info!(
        "User: {} reserved parking space: {} as reservation: {}",
        reservation.user_id, reservation.parking_space_id, reservation.id
    );
    Ok(reservation)
}

pub async fn add_reservation(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
    Json(body): Json<ReserveParkingSpace>,
) -> impl IntoResponse {
    return match reserve(&postgres_repo, &current_user, body).await {
        Ok(reservation) => {
            (StatusCode::CREATED, Json(reservation)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong adding reservation for user: {}, due to: {}", current_user.user.id, e);
            e.into_response()
        }
    };
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeleteReservationQuery {
    pub id: String,
}

pub fn can_delete(current_user: &CurrentUser, reservation: &Reservation) -> AppResult<()> {
    if current_user.user.admin || reservation.user_id == current_user.user.id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Reservation {} belongs to another user",
            reservation.id
        )))
    }
}

async fn cancel(
    postgres_repo: &PostgresConnectionRepo,
    current_user: &CurrentUser,
    reservation_id: &str,
) -> AppResult<()> {
    let reservation = postgres_repo
        .retrieve_reservation(reservation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reservation {}", reservation_id)))?;
    can_delete(current_user, &reservation)?;

    postgres_repo.remove_reservation(reservation_id).await
}

pub async fn delete_reservation(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
    Query(query): Query<DeleteReservationQuery>,
) -> impl IntoResponse {
    return match cancel(&postgres_repo, &current_user, &query.id).await {
        Ok(_) => {
            (StatusCode::OK, "Successfully removed reservation").into_response()
        }
        Err(e) => {
            warn!("Something went wrong removing reservation: {}, due to: {}", query.id, e);
            e.into_response()
        }
    };
}
