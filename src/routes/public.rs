use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines the endpoints reachable without a bearer token: the health probe
/// and the two gateway operations of the session lifecycle. Everything else
/// in the API requires authentication.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Public account creation for the farmer and investor roles. Creates
        // the user and its subtype profile in one transaction and issues the
        // first bearer token.
        .route("/register", post(handlers::register))
        // POST /login
        // Credential check plus token rotation: all prior tokens for the
        // user are revoked, exactly one new token is issued.
        .route("/login", post(handlers::login))
}
