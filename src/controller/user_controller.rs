use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::warn;
use crate::controller::AppState;
use crate::controller::current_user::CurrentUser;
use crate::models::user::UserSummary;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    let postgres_repo = Arc::new(PostgresConnectionRepo::new(
        app_state.postgres_connection
    ));

    Router::new()
        .route("/me", get(get_current_user))
        .route("/me/summary", get(get_user_summary))
        .route_layer(Extension(postgres_repo))
}

pub async fn get_current_user(
    current_user: CurrentUser,
) -> impl IntoResponse {
    (StatusCode::OK, Json(current_user.user))
}

/// Counts shown on the home screen.
pub async fn get_user_summary(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
) -> impl IntoResponse {
    let user_reservations_res = postgres_repo
        .retrieve_user_reservations(
            &current_user.user.id
        ).await;

    return match user_reservations_res {
        Ok(reservations) => {
            (StatusCode::OK, Json(UserSummary::from_reservations(&reservations))).into_response()
        }
        Err(e) => {
            warn!("Something went wrong summarizing reservations of user: {}, due to: {}", current_user.user.id, e);
            e.into_response()
        }
    };
}
