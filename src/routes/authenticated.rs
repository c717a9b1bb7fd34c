use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any user holding a live bearer token, regardless of role.
/// Every handler here receives the resolved `AuthUser` identity; the token
/// is passed explicitly through the extractor, never through ambient state.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Returns the authenticated user's record. No side effects.
        .route("/me", get(handlers::me))
        // POST /logout
        // Revokes only the token used for this request; other sessions for
        // the same user stay valid.
        .route("/logout", post(handlers::logout))
}
