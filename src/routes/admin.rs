use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Account-management routes restricted to the admin role. The router is
/// nested under `/admin`; authentication happens through the `AuthUser`
/// extractor in each handler, followed by an explicit role check, so a valid
/// token with the wrong role gets a 403, not a 404.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/admins: admin-creation path (role fixed, no subtype).
        // GET  /admin/admins: list all admin users.
        .route(
            "/admins",
            post(handlers::create_admin).get(handlers::list_admins),
        )
        // Farmer account management. Creation goes through the same
        // transactional account+profile path as public registration.
        .route(
            "/farmers",
            get(handlers::list_farmers).post(handlers::store_farmer),
        )
        .route(
            "/farmers/{id}",
            get(handlers::get_farmer_details)
                .put(handlers::update_farmer)
                .delete(handlers::delete_farmer),
        )
        // Investor account management, symmetric with the farmer routes.
        .route(
            "/investors",
            get(handlers::list_investors).post(handlers::store_investor),
        )
        .route(
            "/investors/{id}",
            get(handlers::get_investor_details)
                .put(handlers::update_investor)
                .delete(handlers::delete_investor),
        )
}
