use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::models::{LoginRequest, LoginResponse, MessageResponse, SignupRequest, UserInfo};
use crate::auth::users::UserRepository;

/// Shared state of the auth backend
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub bcrypt_cost: u32,
}

pub type SharedState = Arc<AppState>;

/// Handler failures, rendered as a JSON `{message}` body
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("User already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Internal failure during signup; the detail is logged, never returned
    #[error("Error signing up")]
    Signup(String),

    /// Internal failure during login; the detail is logged, never returned
    #[error("Error logging in")]
    Login(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UserExists | ApiError::UserNotFound | ApiError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Signup(_) | ApiError::Login(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Signup(detail) | ApiError::Login(detail) => {
                tracing::error!(error = %detail, "{}", self);
            }
            _ => tracing::debug!("Rejected auth request: {}", self),
        }
        (self.status(), Json(MessageResponse::new(self.to_string()))).into_response()
    }
}

pub async fn home() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the Home Page!"))
}

pub async fn signup(
    State(state): State<SharedState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Signup(e.body_text()))?;
    let existing = state
        .users
        .find_by_email(&request.email)
        .await
        .map_err(|e| ApiError::Signup(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::UserExists);
    }

    let cost = state.bcrypt_cost;
    let password = request.password;
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Signup(e.to_string()))?
        .map_err(|e| ApiError::Signup(e.to_string()))?;

    // a taken username surfaces here as a constraint violation
    let user = state
        .users
        .insert(&request.username, &request.email, &hash)
        .await
        .map_err(|e| ApiError::Signup(e.to_string()))?;

    tracing::info!(user_id = user.id, username = %user.username, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Signup successful")),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Login(e.body_text()))?;
    let user = state
        .users
        .find_by_email(&request.email)
        .await
        .map_err(|e| ApiError::Login(e.to_string()))?
        .ok_or(ApiError::UserNotFound)?;

    let password = request.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Login(e.to_string()))?
        .map_err(|e| ApiError::Login(e.to_string()))?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    tracing::info!(user_id = user.id, username = %user.username, "User logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: UserInfo {
            username: user.username,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_router;
    use crate::auth::users::SqliteUserRepository;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let users = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        create_router(Arc::new(AppState {
            users: Arc::new(users),
            bcrypt_cost: 4,
        }))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn send_raw(app: &Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn alice() -> Value {
        json!({"username": "alice", "email": "alice@example.com", "password": "hunter2"})
    }

    #[tokio::test]
    async fn test_home() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/home", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome to the Home Page!");
    }

    #[tokio::test]
    async fn test_signup_then_duplicate_email() {
        let app = app().await;
        let (status, body) = send(&app, "POST", "/signup", Some(alice())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Signup successful");

        let (status, body) = send(&app, "POST", "/signup", Some(alice())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_internal_error() {
        let app = app().await;
        send(&app, "POST", "/signup", Some(alice())).await;

        let other = json!({"username": "alice", "email": "other@example.com", "password": "x"});
        let (status, body) = send(&app, "POST", "/signup", Some(other)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error signing up");
    }

    #[tokio::test]
    async fn test_malformed_signup_body_is_json_internal_error() {
        let app = app().await;
        let partial = json!({"email": "alice@example.com"});
        let (status, body) = send(&app, "POST", "/signup", Some(partial)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error signing up");

        let (status, body) = send_raw(&app, "/signup", "{not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error signing up");
    }

    #[tokio::test]
    async fn test_malformed_login_body_is_json_internal_error() {
        let app = app().await;
        let partial = json!({"email": "alice@example.com"});
        let (status, body) = send(&app, "POST", "/login", Some(partial)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error logging in");

        let (status, body) = send_raw(&app, "/login", "{not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error logging in");
    }

    #[tokio::test]
    async fn test_login_success_returns_username() {
        let app = app().await;
        send(&app, "POST", "/signup", Some(alice())).await;

        let creds = json!({"email": "alice@example.com", "password": "hunter2"});
        let (status, body) = send(&app, "POST", "/login", Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let app = app().await;
        send(&app, "POST", "/signup", Some(alice())).await;

        let creds = json!({"email": "alice@example.com", "password": "wrong"});
        let (status, body) = send(&app, "POST", "/login", Some(creds)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let app = app().await;
        let creds = json!({"email": "nobody@example.com", "password": "x"});
        let (status, body) = send(&app, "POST", "/login", Some(creds)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let users = Arc::new(SqliteUserRepository::connect("sqlite::memory:").await.unwrap());
        let app = create_router(Arc::new(AppState {
            users: users.clone(),
            bcrypt_cost: 4,
        }));
        send(&app, "POST", "/signup", Some(alice())).await;

        let stored = users.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter2");
        assert!(bcrypt::verify("hunter2", &stored.password_hash).unwrap());
    }
}
