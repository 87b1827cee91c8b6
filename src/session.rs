//! Dashboard-side session handling
//!
//! The session is the `{username}` record returned by a successful login,
//! kept unsigned in the `user` slot. Any record in that slot counts as
//! logged in.

use crate::auth::models::{LoginRequest, LoginResponse, MessageResponse, SignupRequest};
use crate::constants::{REQUEST_TIMEOUT_SECS, STORAGE_SESSION, USER_AGENT};
use crate::error::{SessionError, StorageError};
use crate::storage::KeyValueStorage;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
}

/// Reads and writes the session slot
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The stored session; unreadable or malformed records count as logged out
    pub fn current(&self) -> Option<Session> {
        let raw = match self.storage.get(STORAGE_SESSION) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed session record, ignoring");
                None
            }
        }
    }

    /// Returns the session or [`SessionError::NotLoggedIn`]
    pub fn require(&self) -> Result<Session, SessionError> {
        self.current().ok_or(SessionError::NotLoggedIn)
    }

    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| StorageError::serialize(STORAGE_SESSION, e))?;
        self.storage.set(STORAGE_SESSION, &raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(STORAGE_SESSION)
    }
}

/// HTTP client for the auth backend
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Registers a user and returns the backend's confirmation message
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, SessionError> {
        let response = self
            .client
            .post(format!("{}/signup", self.base_url))
            .json(request)
            .send()
            .await?;

        let body: MessageResponse = accept(response).await?.json().await?;
        Ok(body.message)
    }

    /// Logs in and returns the session to persist
    pub async fn login(&self, request: &LoginRequest) -> Result<Session, SessionError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(request)
            .send()
            .await?;

        let body: LoginResponse = accept(response).await?.json().await?;
        tracing::debug!(username = %body.user.username, "{}", body.message);
        Ok(Session {
            username: body.user.username,
        })
    }
}

/// Passes 2xx responses through and turns the rest into `Rejected`
async fn accept(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageResponse>(&text)
        .map(|body| body.message)
        .unwrap_or_else(|_| format!("HTTP {}", status));

    Err(SessionError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_router, AppState, SqliteUserRepository};
    use crate::storage::MemoryStorage;

    async fn spawn_backend() -> String {
        let users = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        let app = create_router(Arc::new(AppState {
            users: Arc::new(users),
            bcrypt_cost: 4,
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn signup_request() -> SignupRequest {
        SignupRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_session_store_roundtrip() {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        assert!(store.current().is_none());
        assert!(matches!(store.require(), Err(SessionError::NotLoggedIn)));

        let session = Session {
            username: "alice".to_string(),
        };
        store.save(&session).unwrap();
        assert_eq!(store.current(), Some(session));

        store.clear().unwrap();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_malformed_session_is_logged_out() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(STORAGE_SESSION, "not json").unwrap();
        assert!(SessionStore::new(storage).current().is_none());
    }

    #[tokio::test]
    async fn test_signup_and_login_against_backend() {
        let client = AuthClient::new(spawn_backend().await).unwrap();

        let message = client.signup(&signup_request()).await.unwrap();
        assert_eq!(message, "Signup successful");

        let session = client
            .login(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn test_rejections_carry_backend_message() {
        let client = AuthClient::new(spawn_backend().await).unwrap();
        client.signup(&signup_request()).await.unwrap();

        match client.signup(&signup_request()).await {
            Err(SessionError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "User already exists");
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let err = client
            .login(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}
