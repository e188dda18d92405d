use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    repository::RepositoryState,
    session::{TokenVerifier, request_cookies, session_access_token},
};

/// AuthUser
///
/// The resolved identity of a request. `id` is the `sub` of the verified access token,
/// which is also the `"Profile".id` and the first path segment of the user's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Access token carried by the request: `Authorization: Bearer ...` first, then the
/// session cookie set at login.
fn request_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => session_access_token(&request_cookies(&parts.headers)),
    }
}

/// AuthUser Extractor
///
/// Unlike the session router, which may run in decode-only mode, this always checks the
/// HS256 signature and `exp` against `SUPABASE_JWT_SECRET` before trusting `sub`.
///
/// In `Env::Local` an `x-user-id` header naming an existing profile is accepted as-is.
///
/// Rejection: `401 Unauthorized` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let header_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());

            if let Some(user_id) = header_id {
                let repo = RepositoryState::from_ref(state);
                if let Ok(Some(profile)) = repo.get_profile(user_id).await {
                    return Ok(AuthUser { id: profile.id });
                }
            }
        }

        let token = request_token(parts).ok_or(StatusCode::UNAUTHORIZED)?;

        let subject = TokenVerifier::hs256(&config.jwt_secret)
            .subject(&token)
            .map_err(|e| {
                tracing::debug!("rejected access token: {}", e);
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let id = Uuid::parse_str(&subject).map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser { id })
    }
}

// --- Auth Service collaborator ---

/// AuthSession
///
/// Session issued by the Auth Service on password sign-in. Serialised as-is into the
/// session cookie, so the field names follow the Auth Service's JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
}

/// AuthServiceError
#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// The Auth Service answered and said no (bad credentials, e-mail taken, ...).
    #[error("{0}")]
    Rejected(String),
    /// The Auth Service could not be reached or answered with something unreadable.
    #[error("{0}")]
    Unavailable(String),
}

impl From<AuthServiceError> for AppError {
    fn from(e: AuthServiceError) -> Self {
        match e {
            AuthServiceError::Rejected(message) => AppError::Validation(message),
            AuthServiceError::Unavailable(message) => AppError::Upstream(message),
        }
    }
}

/// AuthService
///
/// The hosted identity provider. Owns credentials and issues signed access tokens;
/// this service never sees a password hash.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Creates the account and returns the new user id.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fullname: &str,
    ) -> Result<Uuid, AuthServiceError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthServiceError>;

    /// Revokes the refresh tokens behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError>;
}

pub type AuthServiceState = Arc<dyn AuthService>;

/// SupabaseAuthClient
///
/// `AuthService` over the GoTrue REST API exposed at `<SUPABASE_URL>/auth/v1`.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(project_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    /// Sends the request and turns non-2xx answers into `Rejected` with GoTrue's message.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AuthServiceError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| AuthServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = error_message(&body).unwrap_or_else(|| status.to_string());
        if status.is_server_error() {
            Err(AuthServiceError::Unavailable(message))
        } else {
            Err(AuthServiceError::Rejected(message))
        }
    }
}

/// GoTrue has used `msg`, `message` and `error_description` over time.
fn error_message(body: &Value) -> Option<String> {
    ["msg", "message", "error_description"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fullname: &str,
    ) -> Result<Uuid, AuthServiceError> {
        let request = self
            .client
            .post(format!("{}/signup", self.base_url))
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "fullname": fullname },
            }));

        let body: Value = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| AuthServiceError::Unavailable(e.to_string()))?;

        // With e-mail confirmation on the body is the user; with autoconfirm it is a session.
        body.get("user")
            .and_then(|user| user.get("id"))
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| AuthServiceError::Unavailable("sign-up response carried no user id".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthServiceError> {
        let request = self
            .client
            .post(format!("{}/token?grant_type=password", self.base_url))
            .json(&serde_json::json!({ "email": email, "password": password }));

        self.send(request)
            .await?
            .json::<AuthSession>()
            .await
            .map_err(|e| AuthServiceError::Unavailable(e.to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError> {
        let request = self
            .client
            .post(format!("{}/logout", self.base_url))
            .bearer_auth(access_token);

        self.send(request).await.map(|_| ())
    }
}

// --- Mock ---

#[derive(Debug, Serialize)]
struct MockClaims {
    sub: String,
    aud: String,
    exp: u64,
    iat: u64,
}

struct MockAccount {
    id: Uuid,
    password: String,
}

/// MockAuthService
///
/// In-memory `AuthService` for tests. Access tokens are real HS256 JWTs signed with the
/// configured secret, so they pass the `AuthUser` extractor and the session router.
#[derive(Clone)]
pub struct MockAuthService {
    secret: String,
    accounts: Arc<Mutex<HashMap<String, MockAccount>>>,
    signed_out: Arc<Mutex<Vec<String>>>,
}

impl MockAuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            accounts: Arc::new(Mutex::new(HashMap::new())),
            signed_out: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Access tokens passed to `sign_out`.
    pub fn signed_out_tokens(&self) -> Vec<String> {
        self.signed_out
            .lock()
            .map(|tokens| tokens.clone())
            .unwrap_or_default()
    }

    fn mint(&self, user_id: Uuid) -> Result<String, AuthServiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let claims = MockClaims {
            sub: user_id.to_string(),
            aud: "authenticated".to_string(),
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthServiceError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _fullname: &str,
    ) -> Result<Uuid, AuthServiceError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| AuthServiceError::Unavailable("mock poisoned".to_string()))?;

        if accounts.contains_key(email) {
            return Err(AuthServiceError::Rejected("User already registered".to_string()));
        }

        let id = Uuid::new_v4();
        accounts.insert(
            email.to_string(),
            MockAccount {
                id,
                password: password.to_string(),
            },
        );
        Ok(id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthServiceError> {
        let user_id = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthServiceError::Unavailable("mock poisoned".to_string()))?;
            match accounts.get(email) {
                Some(account) if account.password == password => account.id,
                _ => {
                    return Err(AuthServiceError::Rejected(
                        "Invalid login credentials".to_string(),
                    ));
                }
            }
        };

        Ok(AuthSession {
            access_token: self.mint(user_id)?,
            refresh_token: Uuid::new_v4().simple().to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: None,
            user: SessionUser { id: user_id },
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthServiceError> {
        if let Ok(mut tokens) = self.signed_out.lock() {
            tokens.push(access_token.to_string());
        }
        Ok(())
    }
}
