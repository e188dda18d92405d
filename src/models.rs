use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// One row per Auth Service user, keyed by the same UUID as `auth.users.id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub fullname: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Task
///
/// A to-do item from the `"Task"` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    // Owner; every mutation filters on it.
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Note
///
/// A markdown note. `content` is stored raw; rendering happens client-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub created_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Photo
///
/// Drive entry. `url` is the public URL of the blob in the storage bucket.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Photo {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub uploaded_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Food
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub uploaded_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
///
/// A review of a Food entry. Only the food's owner reviews it, and only the author may
/// edit or delete a review.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub food_id: i64,
    pub content: String,
    pub rating: Option<i32>,
    pub created_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Pokemon
///
/// A collection entry. `pokemon_id` is the national dex number from PokeAPI,
/// unique per owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Pokemon {
    pub id: i64,
    pub pokemon_id: i64,
    pub pokemon_name: String,
    pub pokemon_image_url: String,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PokemonReview
///
/// `pokemon_id` references `"Pokemon".id` (the collection row), not the dex number.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PokemonReview {
    pub id: i64,
    pub pokemon_id: i64,
    pub content: String,
    pub rating: Option<i32>,
    pub created_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Listing ---

/// SortOrder
///
/// Orderings offered by every list view. `name` means the entity's title/name column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    NameAsc,
    NameDesc,
}

/// ListQuery
///
/// `?search=...&sort=...` accepted by every listing page and endpoint.
#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Case-insensitive substring match on the title/name column.
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
}

impl ListQuery {
    /// The search term, trimmed, or `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort.unwrap_or_default()
    }
}

// --- Request Payloads (Input Schemas) ---

fn require(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    check_max(field, value, max)
}

fn check_max(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} must be less than {} characters",
            field, max
        )));
    }
    Ok(())
}

fn check_rating(rating: Option<i32>) -> Result<(), AppError> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        )),
        _ => Ok(()),
    }
}

/// CreateTaskRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Title", &self.title, 255)?;
        if let Some(description) = &self.description {
            check_max("Description", description, 500)?;
        }
        Ok(())
    }
}

/// UpdateTaskRequest
///
/// Partial update; omitted fields keep their current value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateTaskRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require("Title", title, 255)?;
        }
        if let Some(description) = &self.description {
            check_max("Description", description, 500)?;
        }
        Ok(())
    }
}

/// CreateNoteRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: Option<String>,
}

impl CreateNoteRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Title", &self.title, 255)
    }
}

/// UpdateNoteRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNoteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UpdateNoteRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.title {
            Some(title) => require("Title", title, 255),
            None => Ok(()),
        }
    }
}

/// CreateUploadRequest
///
/// Registers a blob the client already PUT through a presigned URL
/// (see `PresignedUrlResponse.resource_key`). Used for both photos and food entries.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUploadRequest {
    pub name: String,
    pub resource_key: String,
}

impl CreateUploadRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Name", &self.name, 255)?;
        require("File", &self.resource_key, 1024)
    }
}

/// UpdateUploadRequest
///
/// Rename and/or replace the blob. A replaced blob is removed from storage.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUploadRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<String>,
}

impl UpdateUploadRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            require("Name", name, 255)?;
        }
        if let Some(key) = &self.resource_key {
            require("File", key, 1024)?;
        }
        Ok(())
    }
}

/// CreateReviewRequest
///
/// Shared by food reviews and pokemon reviews.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub content: String,
    pub rating: Option<i32>,
}

impl CreateReviewRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Review content", &self.content, 1000)?;
        check_rating(self.rating)
    }
}

/// UpdateReviewRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(content) = &self.content {
            require("Review content", content, 1000)?;
        }
        check_rating(self.rating)
    }
}

/// CreatePokemonRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePokemonRequest {
    pub pokemon_id: i64,
    pub pokemon_name: String,
    pub pokemon_image_url: String,
}

impl CreatePokemonRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=10000).contains(&self.pokemon_id) {
            return Err(AppError::Validation("Invalid Pokemon ID".to_string()));
        }
        require("Pokemon name", &self.pokemon_name, 255)?;
        require("Image URL", &self.pokemon_image_url, 2048)
    }
}

/// UpdatePokemonRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePokemonRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokemon_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokemon_image_url: Option<String>,
}

impl UpdatePokemonRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.pokemon_name {
            require("Pokemon name", name, 255)?;
        }
        if let Some(url) = &self.pokemon_image_url {
            require("Image URL", url, 2048)?;
        }
        Ok(())
    }
}

/// PokemonLookup
///
/// A PokeAPI search hit, ready to be posted back as a `CreatePokemonRequest`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct PokemonLookup {
    pub pokemon_id: i64,
    pub pokemon_name: String,
    pub pokemon_image_url: String,
}

/// PokemonSearchQuery
#[derive(Debug, Clone, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PokemonSearchQuery {
    /// Pokémon name, any case.
    pub name: String,
}

// --- Page Views ---

/// FoodEntry
///
/// A food with its reviews, newest review first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FoodEntry {
    #[serde(flatten)]
    #[ts(flatten)]
    pub food: Food,
    pub reviews: Vec<Review>,
}

/// PokemonEntry
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PokemonEntry {
    #[serde(flatten)]
    #[ts(flatten)]
    pub pokemon: Pokemon,
    pub reviews: Vec<PokemonReview>,
}

// --- Auth Payloads ---

/// RegisterRequest
///
/// The password is forwarded to the Auth Service and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub fullname: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Email", &self.email, 255)?;
        if !looks_like_email(&self.email) {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        require("Full name", &self.fullname, 255)?;
        if self.password.chars().count() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        check_max("Password", &self.password, 50)?;
        if self.password != self.confirm_password {
            return Err(AppError::Validation("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("Email", &self.email, 255)?;
        require("Password", &self.password, 50)
    }
}

/// LoginResponse
///
/// The session itself travels in the `sb-*-auth-token` cookie; the body only says where to go.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub redirect_to: String,
}

/// ActionMessage
///
/// `{ "success": true, "message": "..." }` returned by actions with nothing else to report.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ActionMessage {
    pub success: bool,
    pub message: String,
}

impl ActionMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// --- Uploads ---

/// UploadKind
///
/// Which feature an upload belongs to; decides the key prefix in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UploadKind {
    #[default]
    Photo,
    Food,
}

impl UploadKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            UploadKind::Photo => "photos",
            UploadKind::Food => "foods",
        }
    }
}

/// PresignedUrlRequest
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// Original filename; only the extension is kept.
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// MIME type the upload is constrained to.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
    #[serde(default)]
    pub kind: UploadKind,
}

impl PresignedUrlRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("File name", &self.filename, 255)?;
        match self.file_type.as_str() {
            "image/jpeg" | "image/jpg" | "image/png" => Ok(()),
            _ => Err(AppError::Validation(
                "File must be a JPEG or PNG image".to_string(),
            )),
        }
    }
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// Time-limited URL for the PUT request.
    pub upload_url: String,
    /// Object key to hand back in `CreateUploadRequest.resource_key`.
    pub resource_key: String,
    /// Where the object will be readable once uploaded.
    pub public_url: String,
}

/// UserProfile
///
/// Output of `GET /api/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub fullname: Option<String>,
    pub home: String,
}

/// Capitalises the first letter of every word and lower-cases the rest.
pub fn capitalize_words(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
