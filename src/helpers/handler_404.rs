use axum::http::Uri;
use axum::response::IntoResponse;

use crate::error::AppError;

pub async fn page_not_found_handler(uri: Uri) -> impl IntoResponse {
    AppError::NotFound(format!("No endpoint at {}", uri.path()))
}
