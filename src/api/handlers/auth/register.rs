//! User registration endpoint.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthState;
use super::storage::{insert_user, SignupOutcome};
use super::types::{MessageResponse, RegisterRequest};
use super::utils::{normalize_email, valid_email, valid_name, valid_password, valid_username};

#[utoipa::path(
    post,
    path = "/auth/user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email or username already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let name = request.name.trim().to_string();
    if !valid_name(&name) {
        return (StatusCode::BAD_REQUEST, "Invalid name".to_string()).into_response();
    }

    let username = request.username.trim().to_string();
    if !valid_username(&username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }

    let email_normalized = normalize_email(&request.email);
    if !valid_email(&email_normalized) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if !valid_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be between 8 and 128 characters".to_string(),
        )
            .into_response();
    }

    // Key stretching is CPU-bound; keep it off the async runtime threads.
    let hasher = auth_state.hasher().clone();
    let password = request.password;
    let password_hash =
        match tokio::task::spawn_blocking(move || hasher.hash(&password)).await {
            Ok(Ok(hash)) => hash,
            Ok(Err(err)) => {
                error!("Failed to hash password: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Registration failed".to_string(),
                )
                    .into_response();
            }
            Err(err) => {
                error!("Password hashing task failed: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Registration failed".to_string(),
                )
                    .into_response();
            }
        };

    match insert_user(&pool, &name, &username, &email_normalized, &password_hash).await {
        Ok(SignupOutcome::Created(_)) => (
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "User created".to_string(),
            }),
        )
            .into_response(),
        Ok(SignupOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "Email or username already registered".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to insert user: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::hasher::PasswordHasher;
    use super::super::state::{AuthConfig, AuthState};
    use super::super::types::RegisterRequest;
    use super::register;
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new("https://aula.dev".to_string());
        let hasher = PasswordHasher::new(SecretString::from("pepper".to_string()));
        Arc::new(AuthState::new(config, hasher))
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = RegisterRequest {
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "not-an-email".to_string(),
            password: "correct horse battery".to_string(),
        };
        let response = register(Extension(pool), Extension(auth_state()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = RegisterRequest {
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "short".to_string(),
        };
        let response = register(Extension(pool), Extension(auth_state()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_username() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = RegisterRequest {
            name: "Ada".to_string(),
            username: "Not Valid".to_string(),
            email: "ada@example.com".to_string(),
            password: "correct horse battery".to_string(),
        };
        let response = register(Extension(pool), Extension(auth_state()), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
