use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pokedex;
pub mod repository;
pub mod session;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthServiceState, MockAuthService, SupabaseAuthClient};
pub use config::AppConfig;
pub use pokedex::{MockPokedex, PokedexClient, PokedexState};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::{RoutingDecision, SessionRouter};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json` and rendered at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::landing, handlers::tasks_page, handlers::notes_page, handlers::drive_page,
        handlers::food_page, handlers::pokemon_page,
        handlers::register, handlers::login, handlers::logout, handlers::get_me,
        handlers::list_tasks, handlers::create_task, handlers::update_task, handlers::delete_task,
        handlers::list_notes, handlers::create_note, handlers::update_note, handlers::delete_note,
        handlers::get_presigned_url,
        handlers::list_photos, handlers::create_photo, handlers::update_photo, handlers::delete_photo,
        handlers::list_foods, handlers::create_food, handlers::update_food, handlers::delete_food,
        handlers::create_review, handlers::update_review, handlers::delete_review,
        handlers::search_pokemon, handlers::list_pokemon, handlers::create_pokemon,
        handlers::update_pokemon, handlers::delete_pokemon,
        handlers::create_pokemon_review, handlers::update_pokemon_review,
        handlers::delete_pokemon_review
    ),
    components(
        schemas(
            models::Profile, models::Task, models::Note, models::Photo, models::Food,
            models::Review, models::Pokemon, models::PokemonReview, models::SortOrder,
            models::CreateTaskRequest, models::UpdateTaskRequest,
            models::CreateNoteRequest, models::UpdateNoteRequest,
            models::CreateUploadRequest, models::UpdateUploadRequest,
            models::CreateReviewRequest, models::UpdateReviewRequest,
            models::CreatePokemonRequest, models::UpdatePokemonRequest, models::PokemonLookup,
            models::FoodEntry, models::PokemonEntry,
            models::RegisterRequest, models::LoginRequest, models::LoginResponse,
            models::ActionMessage, models::UploadKind, models::PresignedUrlRequest,
            models::PresignedUrlResponse, models::UserProfile, error::ErrorBody,
        )
    ),
    tags(
        (name = "sta-clara", description = "Sta. Clara personal productivity API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single shared container for every service the handlers and middleware need.
#[derive(Clone)]
pub struct AppState {
    /// Data Store (Postgres, or in-memory in tests).
    pub repo: RepositoryState,
    /// Blob Store for drive photos and food pictures.
    pub storage: StorageState,
    /// Auth Service (sign-up, sign-in, sign-out).
    pub auth: AuthServiceState,
    pub pokedex: PokedexState,
    pub config: AppConfig,
    /// Request interceptor enforcing per-user route isolation.
    pub session_router: Arc<SessionRouter>,
}

impl AppState {
    /// Assembles the state, deriving the session router from `config`.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        auth: AuthServiceState,
        pokedex: PokedexState,
        config: AppConfig,
    ) -> Self {
        let session_router = Arc::new(config.session_router());
        Self {
            repo,
            storage,
            auth,
            pokedex,
            config,
            session_router,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRouter> {
    fn from_ref(app_state: &AppState) -> Arc<SessionRouter> {
        app_state.session_router.clone()
    }
}

/// route_session
///
/// The request interceptor. Runs before routing on every request; paths outside its
/// scope (API, assets, anything with a dot) are passed straight through. Otherwise the
/// session cookie decides between continuing and a `307` to another page.
pub async fn route_session(
    State(router): State<Arc<SessionRouter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !session::is_routable(&path) {
        return next.run(request).await;
    }

    let cookies = session::request_cookies(request.headers());
    match router.route(&path, &cookies) {
        RoutingDecision::Continue => next.run(request).await,
        RoutingDecision::Redirect(location) => {
            tracing::debug!(from = %path, to = %location, "session redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// auth_middleware
///
/// Rejects the request with `401` unless `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles routes, the session interceptor, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // `layer` (not `route_layer`) so unmatched paths are intercepted too.
        .layer(middleware::from_fn_with_state(
            state.session_router.clone(),
            route_session,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span per request carrying method, URI and the `x-request-id` set by `SetRequestIdLayer`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
