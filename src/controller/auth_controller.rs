use std::sync::Arc;
use axum::{Extension, Json, Router};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;
use crate::controller::AppState;
use crate::controller::current_user::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::helpers::password::{hash_password, verify_password};
use crate::models::user::User;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

pub fn router(app_state: AppState) -> Router {
    let postgres_repo = Arc::new(PostgresConnectionRepo::new(
        app_state.postgres_connection
    ));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route_layer(Extension(postgres_repo))
}

#[derive(Serialize, Deserialize, Validate, Clone, Debug)]
pub struct RegisterUser {
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    #[validate(length(min = 8, max = 16, message = "Password must be between 8 and 16 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Residence country is required"))]
    pub residence_country: String,
}

/// Emails identify users regardless of letter case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl RegisterUser {
    fn trimmed(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            residence_country: self.residence_country.trim().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Validate, Clone, Debug)]
pub struct LoginUser {
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    #[validate(length(min = 8, max = 16, message = "Password must be between 8 and 16 characters"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub fn validate<T: Validate>(body: &T) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

async fn register_user(
    postgres_repo: &PostgresConnectionRepo,
    body: RegisterUser,
) -> AppResult<Session> {
    let body = body.trimmed();
    validate(&body)?;

    let password_hash = hash_password(&body.password)?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        admin: false,
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
        residence_country: body.residence_country,
    };
    postgres_repo.add_user(&user, &password_hash).await?;

    let token = postgres_repo.create_session(&user.id).await?;
    info!("Registered user: {}", user.id);
    Ok(Session { token, user })
}

pub async fn register(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Json(body): Json<RegisterUser>,
) -> impl IntoResponse {
    return match register_user(&postgres_repo, body).await {
        Ok(session) => {
            (StatusCode::CREATED, Json(session)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong registering user due to: {}", e);
            e.into_response()
        }
    };
}

async fn login_user(
    postgres_repo: &PostgresConnectionRepo,
    body: LoginUser,
) -> AppResult<Session> {
    let body = LoginUser {
        email: normalize_email(&body.email),
        password: body.password,
    };
    validate(&body)?;

    let credentials = postgres_repo
        .retrieve_user_credentials(&body.email)
        .await?
        .ok_or(AppError::InvalidUser)?;

    if !verify_password(&body.password, &credentials.password_hash)? {
        return Err(AppError::WrongPassword);
    }

    let token = postgres_repo.create_session(&credentials.user.id).await?;
    Ok(Session { token, user: credentials.user })
}

pub async fn login(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    Json(body): Json<LoginUser>,
) -> impl IntoResponse {
    return match login_user(&postgres_repo, body).await {
        Ok(session) => {
            (StatusCode::OK, Json(session)).into_response()
        }
        Err(e) => {
            warn!("Something went wrong logging in due to: {}", e);
            e.into_response()
        }
    };
}

pub async fn logout(
    Extension(postgres_repo): Extension<Arc<PostgresConnectionRepo>>,
    current_user: CurrentUser,
) -> impl IntoResponse {
    return match postgres_repo.remove_session(&current_user.token).await {
        Ok(_) => {
            (StatusCode::OK, "Successfully logged out").into_response()
        }
        Err(e) => {
            warn!("Something went wrong logging out user: {}, due to: {}", current_user.user.id, e);
            e.into_response()
        }
    };
}
