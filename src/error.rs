use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bb8_postgres::tokio_postgres::error::SqlState;
use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No user is registered with that email")]
    InvalidUser,

    #[error("The password does not match")]
    WrongPassword,

    #[error("A user with that email already exists")]
    UserCollision,

    #[error("Missing or expired session")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parking space {0} is already reserved for that time window")]
    SpaceUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] bb8_postgres::tokio_postgres::Error),

    #[error("Places API error: {0}")]
    Places(#[from] reqwest::Error),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

/// User facing message identifiers, one per message the client knows how to show.
pub const MESSAGE_USER_DOES_NOT_EXIST: &str = "error_user_does_not_exist";
pub const MESSAGE_WRONG_PASSWORD: &str = "error_wrong_password";
pub const MESSAGE_USER_ALREADY_EXISTS: &str = "error_user_already_exists";
pub const MESSAGE_UNKNOWN: &str = "error_unknown";

impl AppError {
    pub fn message_id(&self) -> &'static str {
        match self {
            Self::InvalidUser => MESSAGE_USER_DOES_NOT_EXIST,
            Self::WrongPassword => MESSAGE_WRONG_PASSWORD,
            Self::UserCollision => MESSAGE_USER_ALREADY_EXISTS,
            _ => MESSAGE_UNKNOWN,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUser => StatusCode::NOT_FOUND,
            Self::WrongPassword => StatusCode::UNAUTHORIZED,
            Self::UserCollision => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::SpaceUnavailable(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Places(_) | Self::Unknown(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a failed insert into the users table, where a unique violation means the email is taken.
    pub fn from_user_insert(err: bb8_postgres::tokio_postgres::Error) -> Self {
        if is_unique_violation(err.code()) {
            Self::UserCollision
        } else {
            Self::Database(err)
        }
    }
}

fn is_unique_violation(code: Option<&SqlState>) -> bool {
    code == Some(&SqlState::UNIQUE_VIOLATION)
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub message_id: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Something went wrong, please try again.".to_string(),
            _ => self.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                message_id: self.message_id(),
                message,
            }),
        ).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_their_own_message_ids() {
        assert_eq!(AppError::InvalidUser.message_id(), MESSAGE_USER_DOES_NOT_EXIST);
        assert_eq!(AppError::WrongPassword.message_id(), MESSAGE_WRONG_PASSWORD);
        assert_eq!(AppError::UserCollision.message_id(), MESSAGE_USER_ALREADY_EXISTS);
    }

    #[test]
    fn everything_else_is_unknown() {
        let errors = vec![
            AppError::Unauthorized,
            AppError::Forbidden("admin only".into()),
            AppError::NotFound("parking lot".into()),
            AppError::Validation("bad window".into()),
            AppError::SpaceUnavailable("space-1".into()),
            AppError::Unknown(anyhow::anyhow!("boom")),
        ];

        for error in errors {
            assert_eq!(error.message_id(), MESSAGE_UNKNOWN, "{error}");
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::UserCollision.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::SpaceUnavailable("a".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::Validation("a".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Unknown(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_unique_violations_mean_the_email_is_taken() {
        assert!(is_unique_violation(Some(&SqlState::UNIQUE_VIOLATION)));
        assert!(!is_unique_violation(Some(&SqlState::FOREIGN_KEY_VIOLATION)));
        assert!(!is_unique_violation(None));
    }

    #[tokio::test]
    async fn response_body_carries_message_id() {
        let response = AppError::WrongPassword.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message_id"], MESSAGE_WRONG_PASSWORD);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Unknown(anyhow::anyhow!("connection refused")).into_response();

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message_id"], MESSAGE_UNKNOWN);
        assert!(!body["message"].as_str().unwrap().contains("connection refused"));
    }
}
