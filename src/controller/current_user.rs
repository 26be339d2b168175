use std::sync::Arc;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Extension;
use anyhow::anyhow;
use tracing::warn;
use crate::error::AppError;
use crate::models::user::User;
use crate::repositories::postgres_repo::PostgresConnectionRepo;

/// The user owning the session named by the `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.user.admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("User {} is not an administrator", self.user.id)))
        }
    }
}

pub fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let Extension(postgres_repo) = Extension::<Arc<PostgresConnectionRepo>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Unknown(anyhow!("Postgres repository missing from router: {}", e)))?;

        match postgres_repo.retrieve_session_user(&token).await {
            Ok(Some(user)) => Ok(CurrentUser { user, token }),
            Ok(None) => Err(AppError::Unauthorized),
            Err(e) => {
                warn!("Something went wrong resolving session due to: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/users/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn user(admin: bool) -> CurrentUser {
        CurrentUser {
            user: User {
                id: "u-1".into(),
                admin,
                email: "ana@parkeasy.dev".into(),
                first_name: "Ana".into(),
                last_name: "Gomez".into(),
                residence_country: "Colombia".into(),
            },
            token: "t".into(),
        }
    }

    #[test]
    fn reads_bearer_tokens() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc123"))), Some("abc123".to_string()));
        assert_eq!(bearer_token(&parts_with(Some("bearer abc123"))), Some("abc123".to_string()));
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        assert_eq!(bearer_token(&parts_with(None)), None);
        assert_eq!(bearer_token(&parts_with(Some("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(Some("abc123"))), None);
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        assert!(user(true).require_admin().is_ok());
        assert!(matches!(user(false).require_admin(), Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized_before_touching_the_database() {
        let mut parts = parts_with(None);
        let rejection = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();

        assert!(matches!(rejection, AppError::Unauthorized));
    }
}
