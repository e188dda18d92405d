use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that accept anonymous requests. The scoped pages live here too: the session
/// router in front of them already enforces per-user isolation for signed-in visitors,
/// and each page redirects to `/` when its own identity check fails.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Landing page. Signed-in visitors are redirected to their to-do list upstream.
        .route("/", get(handlers::landing))
        // --- Auth ---
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        // --- Scoped pages: /{user_id}/<section>?search=...&sort=... ---
        .route("/{user_id}/to-do", get(handlers::tasks_page))
        .route("/{user_id}/notes", get(handlers::notes_page))
        .route("/{user_id}/drive", get(handlers::drive_page))
        .route("/{user_id}/food", get(handlers::food_page))
        .route("/{user_id}/pokemon", get(handlers::pokemon_page))
}
