use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `AuthUser` layer installed in `create_router`, and every
/// handler scopes its reads and writes to that user. Rows owned by someone else behave
/// exactly like missing rows (404).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
        // POST /api/uploads/presigned
        // Short-lived PUT URL for a photo or food picture, uploaded straight to the bucket.
        .route("/api/uploads/presigned", post(handlers::get_presigned_url))
        // --- To-do ---
        .route(
            "/api/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/tasks/{id}",
            put(handlers::update_task).delete(handlers::delete_task),
        )
        // --- Notes ---
        .route(
            "/api/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route(
            "/api/notes/{id}",
            put(handlers::update_note).delete(handlers::delete_note),
        )
        // --- Drive ---
        .route(
            "/api/photos",
            get(handlers::list_photos).post(handlers::create_photo),
        )
        .route(
            "/api/photos/{id}",
            put(handlers::update_photo).delete(handlers::delete_photo),
        )
        // --- Food review ---
        .route(
            "/api/foods",
            get(handlers::list_foods).post(handlers::create_food),
        )
        .route(
            "/api/foods/{id}",
            put(handlers::update_food).delete(handlers::delete_food),
        )
        .route("/api/foods/{id}/reviews", post(handlers::create_review))
        .route(
            "/api/reviews/{id}",
            put(handlers::update_review).delete(handlers::delete_review),
        )
        // --- Pokemon review ---
        // GET /api/pokemon/search?name=pikachu
        // Static segment, so it wins over /api/pokemon/{id}.
        .route("/api/pokemon/search", get(handlers::search_pokemon))
        .route(
            "/api/pokemon",
            get(handlers::list_pokemon).post(handlers::create_pokemon),
        )
        .route(
            "/api/pokemon/{id}",
            put(handlers::update_pokemon).delete(handlers::delete_pokemon),
        )
        .route(
            "/api/pokemon/{id}/reviews",
            post(handlers::create_pokemon_review),
        )
        .route(
            "/api/pokemon-reviews/{id}",
            put(handlers::update_pokemon_review).delete(handlers::delete_pokemon_review),
        )
}
