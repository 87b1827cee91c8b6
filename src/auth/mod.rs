//! Signup/login HTTP backend
//!
//! Stores users in SQLite with bcrypt-hashed passwords. Sessions are not
//! issued; a successful login only returns the username.

pub mod models;
pub mod routes;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub use routes::{ApiError, AppState, SharedState};
pub use users::{SqliteUserRepository, User, UserRepository};

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/signup", post(routes::signup))
        .route("/login", post(routes::login))
        .route("/home", get(routes::home))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Serves the backend on `0.0.0.0:port` until Ctrl-C
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("Auth server running on http://localhost:{}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down auth server");
        })
        .await
}
