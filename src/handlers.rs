use crate::{
    AppState,
    auth::AuthUser,
    config::Env,
    error::{AppError, AppResult, ErrorBody},
    models::{
        ActionMessage, CreateNoteRequest, CreatePokemonRequest, CreateReviewRequest,
        CreateTaskRequest, CreateUploadRequest, Food, FoodEntry, ListQuery, LoginRequest,
        LoginResponse, Note, Photo, Pokemon, PokemonEntry, PokemonLookup, PokemonReview,
        PokemonSearchQuery, PresignedUrlRequest, PresignedUrlResponse, RegisterRequest, Review,
        Task, UpdateNoteRequest, UpdatePokemonRequest, UpdateReviewRequest, UpdateTaskRequest,
        UpdateUploadRequest, UploadKind, UserProfile, capitalize_words,
    },
    session::{BASE64_PREFIX, ROOT_PATH, is_session_cookie, session_access_token},
    storage::{StorageState, sanitize_key},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

// --- Helpers ---

/// page_owner
///
/// Every scoped page re-checks identity on its own: no valid session, or a session for
/// someone other than the path's user, sends the visitor back to the landing page.
fn page_owner(auth: Result<AuthUser, StatusCode>, user_id: &str) -> Result<Uuid, Redirect> {
    match auth {
        Ok(user) if user.id.to_string().eq_ignore_ascii_case(user_id) => Ok(user.id),
        _ => Err(Redirect::temporary(ROOT_PATH)),
    }
}

/// owned_upload_key
///
/// Only keys issued to the caller by `get_presigned_url` for this kind of upload,
/// i.e. `<photos|foods>/<user_id>/...`, may be attached to a row.
fn owned_upload_key(kind: UploadKind, owner: Uuid, key: &str) -> AppResult<String> {
    let key = sanitize_key(key);
    let prefix = format!("{}/{}/", kind.prefix(), owner);
    if key.len() > prefix.len() && key.starts_with(&prefix) {
        Ok(key)
    } else {
        Err(AppError::Validation("File was not uploaded by you".to_string()))
    }
}

/// Removes the blob behind `url` if it lives in our bucket. Failures are only logged:
/// the row is already gone and an orphaned blob is harmless.
async fn discard_blob(storage: &StorageState, url: &str) {
    let Some(key) = storage.key_from_public_url(url) else {
        return;
    };
    if let Err(e) = storage.delete_object(&key).await {
        tracing::warn!(key = %key, "failed to delete blob: {}", e);
    }
}

async fn foods_with_reviews(state: &AppState, foods: Vec<Food>) -> AppResult<Vec<FoodEntry>> {
    let ids: Vec<i64> = foods.iter().map(|f| f.id).collect();
    let reviews = state.repo.list_reviews(&ids).await?;
    Ok(foods
        .into_iter()
        .map(|food| {
            let reviews = reviews
                .iter()
                .filter(|r| r.food_id == food.id)
                .cloned()
                .collect();
            FoodEntry { food, reviews }
        })
        .collect())
}

async fn pokemon_with_reviews(
    state: &AppState,
    pokemon: Vec<Pokemon>,
) -> AppResult<Vec<PokemonEntry>> {
    let ids: Vec<i64> = pokemon.iter().map(|p| p.id).collect();
    let reviews = state.repo.list_pokemon_reviews(&ids).await?;
    Ok(pokemon
        .into_iter()
        .map(|pokemon| {
            let reviews = reviews
                .iter()
                .filter(|r| r.pokemon_id == pokemon.id)
                .cloned()
                .collect();
            PokemonEntry { pokemon, reviews }
        })
        .collect())
}

// --- Landing & Pages ---

/// landing
///
/// [Public Route] The root page. Signed-in visitors never see it: the session router
/// sends them to their to-do list first.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = ActionMessage))
)]
pub async fn landing() -> Json<ActionMessage> {
    Json(ActionMessage::ok("Welcome to Sta. Clara. Log in to get started."))
}

/// tasks_page
///
/// [Scoped Page] `/{user_id}/to-do`: the owner's tasks.
#[utoipa::path(
    get,
    path = "/{user_id}/to-do",
    params(("user_id" = String, Path, description = "Owner id"), ListQuery),
    responses(
        (status = 200, description = "Tasks", body = [Task]),
        (status = 307, description = "Not signed in as this user")
    )
)]
pub async fn tasks_page(
    auth: Result<AuthUser, StatusCode>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let owner = match page_owner(auth, &user_id) {
        Ok(owner) => owner,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let tasks = state.repo.list_tasks(owner, &query).await?;
    Ok(Json(tasks).into_response())
}

/// notes_page
#[utoipa::path(
    get,
    path = "/{user_id}/notes",
    params(("user_id" = String, Path, description = "Owner id"), ListQuery),
    responses(
        (status = 200, description = "Notes", body = [Note]),
        (status = 307, description = "Not signed in as this user")
    )
)]
pub async fn notes_page(
    auth: Result<AuthUser, StatusCode>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let owner = match page_owner(auth, &user_id) {
        Ok(owner) => owner,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let notes = state.repo.list_notes(owner, &query).await?;
    Ok(Json(notes).into_response())
}

/// drive_page
#[utoipa::path(
    get,
    path = "/{user_id}/drive",
    params(("user_id" = String, Path, description = "Owner id"), ListQuery),
    responses(
        (status = 200, description = "Photos", body = [Photo]),
        (status = 307, description = "Not signed in as this user")
    )
)]
pub async fn drive_page(
    auth: Result<AuthUser, StatusCode>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let owner = match page_owner(auth, &user_id) {
        Ok(owner) => owner,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let photos = state.repo.list_photos(owner, &query).await?;
    Ok(Json(photos).into_response())
}

/// food_page
///
/// [Scoped Page] Foods with their reviews attached.
#[utoipa::path(
    get,
    path = "/{user_id}/food",
    params(("user_id" = String, Path, description = "Owner id"), ListQuery),
    responses(
        (status = 200, description = "Foods", body = [FoodEntry]),
        (status = 307, description = "Not signed in as this user")
    )
)]
pub async fn food_page(
    auth: Result<AuthUser, StatusCode>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let owner = match page_owner(auth, &user_id) {
        Ok(owner) => owner,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let foods = state.repo.list_foods(owner, &query).await?;
    Ok(Json(foods_with_reviews(&state, foods).await?).into_response())
}

/// pokemon_page
#[utoipa::path(
    get,
    path = "/{user_id}/pokemon",
    params(("user_id" = String, Path, description = "Owner id"), ListQuery),
    responses(
        (status = 200, description = "Pokemon", body = [PokemonEntry]),
        (status = 307, description = "Not signed in as this user")
    )
)]
pub async fn pokemon_page(
    auth: Result<AuthUser, StatusCode>,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Response> {
    let owner = match page_owner(auth, &user_id) {
        Ok(owner) => owner,
        Err(redirect) => return Ok(redirect.into_response()),
    };
    let pokemon = state.repo.list_pokemon(owner, &query).await?;
    Ok(Json(pokemon_with_reviews(&state, pokemon).await?).into_response())
}

// --- Auth ---

/// register
///
/// [Public Route] Creates the account with the Auth Service, then the matching
/// `"Profile"` row keyed by the same id. The full name is stored capitalised.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ActionMessage),
        (status = 400, description = "Validation error", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ActionMessage>)> {
    payload.validate()?;

    let fullname = capitalize_words(&payload.fullname);
    let user_id = state
        .auth
        .sign_up(payload.email.trim(), &payload.password, &fullname)
        .await?;

    state.repo.create_profile(user_id, &fullname).await?;
    tracing::info!(%user_id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(ActionMessage::ok("Account created successfully")),
    ))
}

/// login
///
/// [Public Route] Password sign-in. On success the session is written to the
/// `sb-<project>-auth-token` cookie as `base64-<base64url(JSON session)>`, the same shape
/// the session router reads on every page request.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    payload.validate()?;

    let session = state
        .auth
        .sign_in(payload.email.trim(), &payload.password)
        .await?;

    let json = serde_json::to_vec(&session)
        .map_err(|e| AppError::Upstream(format!("unserialisable session: {}", e)))?;
    let value = format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json));

    let cookie = Cookie::build((state.config.session_cookie_name(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.env == Env::Production);

    let user_id = session.user.id;
    let body = LoginResponse {
        success: true,
        user_id,
        redirect_to: state.session_router.home_path(&user_id.to_string()),
    };

    Ok((jar.add(cookie), Json(body)))
}

/// logout
///
/// [Public Route] Clears the session cookie. Revoking the session upstream is
/// best-effort; the cookie is removed either way.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Signed out", body = ActionMessage))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ActionMessage>) {
    let cookies: Vec<Cookie<'static>> = jar.iter().cloned().collect();
    if let Some(token) = session_access_token(&cookies) {
        if let Err(e) = state.auth.sign_out(&token).await {
            tracing::warn!("upstream sign-out failed: {}", e);
        }
    }

    // Every session cookie the router could read, chunks and other project refs included.
    let jar = cookies
        .iter()
        .filter(|cookie| is_session_cookie(cookie.name()))
        .fold(jar, |jar, cookie| {
            jar.remove(Cookie::build((cookie.name().to_string(), "")).path("/"))
        });
    (jar, Json(ActionMessage::ok("Logged out")))
}

/// get_me
///
/// [Authenticated Route] The caller's profile and home page.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_me(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.repo.get_profile(id).await?;
    Ok(Json(UserProfile {
        id,
        fullname: profile.and_then(|p| p.fullname),
        home: state.session_router.home_path(&id.to_string()),
    }))
}

// --- Tasks ---

/// list_tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(ListQuery),
    responses((status = 200, description = "My tasks", body = [Task]))
)]
pub async fn list_tasks(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Task>>> {
    Ok(Json(state.repo.list_tasks(id, &query).await?))
}

/// create_task
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Validation error", body = ErrorBody)
    )
)]
pub async fn create_task(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    payload.validate()?;
    let task = state.repo.create_task(id, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// update_task
///
/// [Authenticated Route] Owner-only; someone else's task is reported as not found.
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_task(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<Task>> {
    payload.validate()?;
    state
        .repo
        .update_task(id, user_id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Task"))
}

/// delete_task
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_task(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.repo.delete_task(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Task"))
    }
}

// --- Notes ---

/// list_notes
#[utoipa::path(
    get,
    path = "/api/notes",
    params(ListQuery),
    responses((status = 200, description = "My notes", body = [Note]))
)]
pub async fn list_notes(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Note>>> {
    Ok(Json(state.repo.list_notes(id, &query).await?))
}

/// create_note
#[utoipa::path(
    post,
    path = "/api/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Validation error", body = ErrorBody)
    )
)]
pub async fn create_note(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateNoteRequest>,
) -> AppResult<(StatusCode, Json<Note>)> {
    payload.validate()?;
    let note = state.repo.create_note(id, payload).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// update_note
#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = Note),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_note(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateNoteRequest>,
) -> AppResult<Json<Note>> {
    payload.validate()?;
    state
        .repo
        .update_note(id, user_id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Note"))
}

/// delete_note
#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_note(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.repo.delete_note(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Note"))
    }
}

// --- Uploads ---

/// get_presigned_url
///
/// [Authenticated Route] Short-lived PUT URL for a JPEG/PNG upload. The object key is
/// `<photos|foods>/<uuid>.<ext>`; the client registers it afterwards through
/// `POST /api/photos` or `POST /api/foods`.
#[utoipa::path(
    post,
    path = "/api/uploads/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Upload URL", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported file", body = ErrorBody)
    )
)]
pub async fn get_presigned_url(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    payload.validate()?;

    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    let object_key = format!(
        "{}/{}/{}.{}",
        payload.kind.prefix(),
        id,
        Uuid::new_v4(),
        extension
    );

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(AppError::Storage)?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        public_url: state.storage.public_url(&object_key),
        resource_key: object_key,
    }))
}

// --- Photos ---

/// list_photos
#[utoipa::path(
    get,
    path = "/api/photos",
    params(ListQuery),
    responses((status = 200, description = "My photos", body = [Photo]))
)]
pub async fn list_photos(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Photo>>> {
    Ok(Json(state.repo.list_photos(id, &query).await?))
}

/// create_photo
#[utoipa::path(
    post,
    path = "/api/photos",
    request_body = CreateUploadRequest,
    responses(
        (status = 201, description = "Photo saved", body = Photo),
        (status = 400, description = "Validation error", body = ErrorBody)
    )
)]
pub async fn create_photo(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUploadRequest>,
) -> AppResult<(StatusCode, Json<Photo>)> {
    payload.validate()?;
    let key = owned_upload_key(UploadKind::Photo, id, &payload.resource_key)?;
    let url = state.storage.public_url(&key);
    let photo = state.repo.create_photo(id, payload.name, url).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

/// update_photo
///
/// [Authenticated Route] Rename and/or replace the file. The previous blob is removed
/// once the row points at the new one.
#[utoipa::path(
    put,
    path = "/api/photos/{id}",
    params(("id" = i64, Path, description = "Photo ID")),
    request_body = UpdateUploadRequest,
    responses(
        (status = 200, description = "Photo updated", body = Photo),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_photo(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUploadRequest>,
) -> AppResult<Json<Photo>> {
    payload.validate()?;
    let new_url = payload
        .resource_key
        .as_deref()
        .map(|key| owned_upload_key(UploadKind::Photo, user_id, key))
        .transpose()?
        .map(|key| state.storage.public_url(&key));

    let existing = state
        .repo
        .get_photo(id, user_id)
        .await?
        .ok_or(AppError::NotFound("Photo"))?;
    let replaced = new_url.as_ref().is_some_and(|url| *url != existing.url);

    let photo = state
        .repo
        .update_photo(id, user_id, payload.name, new_url)
        .await?
        .ok_or(AppError::NotFound("Photo"))?;

    if replaced {
        discard_blob(&state.storage, &existing.url).await;
    }
    Ok(Json(photo))
}

/// delete_photo
#[utoipa::path(
    delete,
    path = "/api/photos/{id}",
    params(("id" = i64, Path, description = "Photo ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_photo(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let photo = state
        .repo
        .delete_photo(id, user_id)
        .await?
        .ok_or(AppError::NotFound("Photo"))?;
    discard_blob(&state.storage, &photo.url).await;
    Ok(StatusCode::NO_CONTENT)
}

// --- Foods ---

/// list_foods
#[utoipa::path(
    get,
    path = "/api/foods",
    params(ListQuery),
    responses((status = 200, description = "My foods with reviews", body = [FoodEntry]))
)]
pub async fn list_foods(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<FoodEntry>>> {
    let foods = state.repo.list_foods(id, &query).await?;
    Ok(Json(foods_with_reviews(&state, foods).await?))
}

/// create_food
#[utoipa::path(
    post,
    path = "/api/foods",
    request_body = CreateUploadRequest,
    responses(
        (status = 201, description = "Food saved", body = Food),
        (status = 400, description = "Validation error", body = ErrorBody)
    )
)]
pub async fn create_food(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUploadRequest>,
) -> AppResult<(StatusCode, Json<Food>)> {
    payload.validate()?;
    let key = owned_upload_key(UploadKind::Food, id, &payload.resource_key)?;
    let url = state.storage.public_url(&key);
    let food = state.repo.create_food(id, payload.name, Some(url)).await?;
    Ok((StatusCode::CREATED, Json(food)))
}

/// update_food
#[utoipa::path(
    put,
    path = "/api/foods/{id}",
    params(("id" = i64, Path, description = "Food ID")),
    request_body = UpdateUploadRequest,
    responses(
        (status = 200, description = "Food updated", body = Food),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_food(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUploadRequest>,
) -> AppResult<Json<Food>> {
    payload.validate()?;
    let new_url = payload
        .resource_key
        .as_deref()
        .map(|key| owned_upload_key(UploadKind::Food, user_id, key))
        .transpose()?
        .map(|key| state.storage.public_url(&key));

    let existing = state
        .repo
        .get_food(id, user_id)
        .await?
        .ok_or(AppError::NotFound("Food"))?;
    let replaced = match (&existing.url, &new_url) {
        (Some(old), Some(new)) => old != new,
        _ => false,
    };

    let food = state
        .repo
        .update_food(id, user_id, payload.name, new_url)
        .await?
        .ok_or(AppError::NotFound("Food"))?;

    if replaced {
        if let Some(old) = &existing.url {
            discard_blob(&state.storage, old).await;
        }
    }
    Ok(Json(food))
}

/// delete_food
///
/// [Authenticated Route] Deletes the food, its reviews and its picture.
#[utoipa::path(
    delete,
    path = "/api/foods/{id}",
    params(("id" = i64, Path, description = "Food ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_food(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let food = state
        .repo
        .delete_food(id, user_id)
        .await?
        .ok_or(AppError::NotFound("Food"))?;
    if let Some(url) = &food.url {
        discard_blob(&state.storage, url).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// create_review
#[utoipa::path(
    post,
    path = "/api/foods/{id}/reviews",
    params(("id" = i64, Path, description = "Food ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = Review),
        (status = 404, description = "Food not found", body = ErrorBody)
    )
)]
pub async fn create_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(food_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    payload.validate()?;
    if state.repo.get_food(food_id, user_id).await?.is_none() {
        return Err(AppError::NotFound("Food"));
    }
    let review = state.repo.create_review(food_id, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// update_review
#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReviewRequest>,
) -> AppResult<Json<Review>> {
    payload.validate()?;
    state
        .repo
        .update_review(id, user_id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Review"))
}

/// delete_review
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.repo.delete_review(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Review"))
    }
}

// --- Pokemon ---

/// search_pokemon
///
/// [Authenticated Route] Looks a Pokémon up on PokeAPI by name.
#[utoipa::path(
    get,
    path = "/api/pokemon/search",
    params(PokemonSearchQuery),
    responses(
        (status = 200, description = "Found", body = PokemonLookup),
        (status = 404, description = "No such Pokémon", body = ErrorBody),
        (status = 502, description = "PokeAPI unavailable", body = ErrorBody)
    )
)]
pub async fn search_pokemon(
    AuthUser { .. }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PokemonSearchQuery>,
) -> AppResult<Json<PokemonLookup>> {
    state
        .pokedex
        .search(&query.name)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?
        .map(Json)
        .ok_or(AppError::NotFound("Pokemon"))
}

/// list_pokemon
#[utoipa::path(
    get,
    path = "/api/pokemon",
    params(ListQuery),
    responses((status = 200, description = "My Pokémon with reviews", body = [PokemonEntry]))
)]
pub async fn list_pokemon(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<PokemonEntry>>> {
    let pokemon = state.repo.list_pokemon(id, &query).await?;
    Ok(Json(pokemon_with_reviews(&state, pokemon).await?))
}

/// create_pokemon
///
/// [Authenticated Route] Adds a Pokémon to the caller's collection. A dex number can
/// only be collected once per user.
#[utoipa::path(
    post,
    path = "/api/pokemon",
    request_body = CreatePokemonRequest,
    responses(
        (status = 201, description = "Added", body = Pokemon),
        (status = 409, description = "Already collected", body = ErrorBody)
    )
)]
pub async fn create_pokemon(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePokemonRequest>,
) -> AppResult<(StatusCode, Json<Pokemon>)> {
    payload.validate()?;

    let duplicate = || AppError::Conflict("You have already added this Pokemon".to_string());

    if state
        .repo
        .find_pokemon_by_dex(id, payload.pokemon_id)
        .await?
        .is_some()
    {
        return Err(duplicate());
    }

    // The unique index catches a concurrent insert that slipped past the check above.
    match state.repo.create_pokemon(id, payload).await {
        Ok(pokemon) => Ok((StatusCode::CREATED, Json(pokemon))),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(duplicate()),
        Err(e) => Err(e.into()),
    }
}

/// update_pokemon
#[utoipa::path(
    put,
    path = "/api/pokemon/{id}",
    params(("id" = i64, Path, description = "Collection entry ID")),
    request_body = UpdatePokemonRequest,
    responses(
        (status = 200, description = "Updated", body = Pokemon),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_pokemon(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePokemonRequest>,
) -> AppResult<Json<Pokemon>> {
    payload.validate()?;
    state
        .repo
        .update_pokemon(id, user_id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Pokemon"))
}

/// delete_pokemon
#[utoipa::path(
    delete,
    path = "/api/pokemon/{id}",
    params(("id" = i64, Path, description = "Collection entry ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_pokemon(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.repo.delete_pokemon(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Pokemon"))
    }
}

/// create_pokemon_review
#[utoipa::path(
    post,
    path = "/api/pokemon/{id}/reviews",
    params(("id" = i64, Path, description = "Collection entry ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = PokemonReview),
        (status = 404, description = "Pokemon not found", body = ErrorBody)
    )
)]
pub async fn create_pokemon_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(pokemon_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<PokemonReview>)> {
    payload.validate()?;
    if state.repo.get_pokemon(pokemon_id, user_id).await?.is_none() {
        return Err(AppError::NotFound("Pokemon"));
    }
    let review = state
        .repo
        .create_pokemon_review(pokemon_id, user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// update_pokemon_review
#[utoipa::path(
    put,
    path = "/api/pokemon-reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = PokemonReview),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn update_pokemon_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReviewRequest>,
) -> AppResult<Json<PokemonReview>> {
    payload.validate()?;
    state
        .repo
        .update_pokemon_review(id, user_id, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Review"))
}

/// delete_pokemon_review
#[utoipa::path(
    delete,
    path = "/api/pokemon-reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not yours", body = ErrorBody)
    )
)]
pub async fn delete_pokemon_review(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.repo.delete_pokemon_review(id, user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Review"))
    }
}
