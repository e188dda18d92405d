use axum::http::{HeaderMap, header};
use axum_extra::extract::cookie::Cookie;
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Prefix the Auth Service puts in front of base64-encoded cookie values.
pub const BASE64_PREFIX: &str = "base64-";

/// Public landing path, also the target of every "go away" redirect.
pub const ROOT_PATH: &str = "/";

/// Section a signed-in visitor lands on when they hit a public path.
pub const HOME_SECTION: &str = "to-do";

const COOKIE_NAME_PREFIX: &str = "sb-";
const COOKIE_NAME_SUFFIX: &str = "-auth-token";

// Path prefixes (after the leading slash) the router never looks at.
const UNROUTED_PREFIXES: [&str; 5] = ["api", "_next/static", "_next/image", "favicon.ico", "public"];

/// SessionError
///
/// Everything that can go wrong while turning a session cookie into a subject.
/// These never reach the client: the router logs them and lets the request through.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("session payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("access_token is present but is not a string")]
    MalformedAccessToken,
    #[error("malformed access token: {0}")]
    MalformedToken(&'static str),
    #[error("access token rejected: {0}")]
    TokenRejected(#[from] jsonwebtoken::errors::Error),
    #[error("sub claim is present but is not a string")]
    MalformedSubject,
}

/// SessionCookie
///
/// The decoded session blob written by the Auth Service at login. Fields are kept as raw
/// JSON values so an absent field and a field of the wrong type can be told apart.
/// Only the access token drives routing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionCookie {
    #[serde(default)]
    pub access_token: Option<Value>,
    #[serde(default)]
    pub refresh_token: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<Value>,
}

impl SessionCookie {
    /// Returns the access token, treating `null` and `""` as absent.
    pub fn access_token(&self) -> Result<Option<&str>, SessionError> {
        match &self.access_token {
            None => Ok(None),
            Some(Value::String(token)) if token.is_empty() => Ok(None),
            Some(Value::String(token)) => Ok(Some(token.as_str())),
            Some(_) => Err(SessionError::MalformedAccessToken),
        }
    }
}

/// TokenClaims
///
/// The part of the access token payload the router reads. Other claims are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<Value>,
}

impl TokenClaims {
    pub fn subject(&self) -> Result<Option<String>, SessionError> {
        match &self.sub {
            None => Ok(None),
            Some(Value::String(sub)) if sub.is_empty() => Ok(None),
            Some(Value::String(sub)) => Ok(Some(sub.clone())),
            Some(_) => Err(SessionError::MalformedSubject),
        }
    }
}

/// TokenVerifier
///
/// Decides how much the router trusts the access token.
///
/// - `Hs256`: the signature is checked against the Auth Service's shared secret and
///   `exp` is enforced before the subject is read. A forged or stale token yields an error.
/// - `Unverified`: the payload segment is only decoded structurally. Any client can mint
///   a token that passes, so this mode exists for compatibility with deployments that
///   cannot share the signing secret.
#[derive(Clone)]
pub enum TokenVerifier {
    Hs256(DecodingKey),
    Unverified,
}

impl TokenVerifier {
    pub fn hs256(secret: &str) -> Self {
        Self::Hs256(DecodingKey::from_secret(secret.as_bytes()))
    }

    pub fn claims(&self, token: &str) -> Result<TokenClaims, SessionError> {
        match self {
            Self::Hs256(key) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_exp = true;
                // Supabase stamps `aud = "authenticated"`; the router has no audience of its own.
                validation.validate_aud = false;
                let data = decode::<TokenClaims>(token, key, &validation)?;
                Ok(data.claims)
            }
            Self::Unverified => decode_unverified(token),
        }
    }

    pub fn subject(&self, token: &str) -> Result<Option<String>, SessionError> {
        self.claims(token)?.subject()
    }
}

fn decode_unverified(token: &str) -> Result<TokenClaims, SessionError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::MalformedToken(
            "expected three dot-separated segments",
        ));
    };

    let bytes = decode_base64(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Accepts both the standard and url-safe alphabets, with or without padding.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, SessionError> {
    let normalized: String = encoded
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    Ok(STANDARD_NO_PAD.decode(normalized)?)
}

/// SessionState
///
/// What the cookie says about the visitor, once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session cookie, or a cookie without an access token.
    NoSession,
    /// An access token whose payload carries no subject.
    NoSubject,
    Subject(String),
}

/// RouteClass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass<'a> {
    Public,
    Scoped { user_id: &'a str },
    Other,
}

/// RoutingDecision
///
/// The only two outcomes the router ever produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    Continue,
    Redirect(String),
}

/// AnonymousPolicy
///
/// What to do with a visitor that has no session when they ask for a scoped path.
/// `PassThrough` leaves the decision to the page, which runs its own authentication
/// check; `Redirect` sends them to the landing page straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnonymousPolicy {
    #[default]
    PassThrough,
    Redirect,
}

fn is_session_cookie_name(name: &str) -> bool {
    name.starts_with(COOKIE_NAME_PREFIX) && name.ends_with(COOKIE_NAME_SUFFIX)
}

/// find_session_cookie
///
/// Returns the value of the first `sb-*-auth-token` cookie. When the session was too
/// large for one cookie the Auth Service splits it into `sb-*-auth-token.0`, `.1`, ...
/// and those chunks are joined back in index order.
pub fn find_session_cookie(cookies: &[Cookie<'_>]) -> Option<String> {
    if let Some(cookie) = cookies.iter().find(|c| is_session_cookie_name(c.name())) {
        return Some(cookie.value().to_string());
    }

    let base = cookies.iter().find_map(|c| {
        let (base, index) = c.name().rsplit_once('.')?;
        (is_session_cookie_name(base) && index.parse::<u32>().is_ok()).then_some(base)
    })?;

    let mut value = String::new();
    for index in 0u32.. {
        let chunk_name = format!("{base}.{index}");
        match cookies.iter().find(|c| c.name() == chunk_name) {
            Some(chunk) => value.push_str(chunk.value()),
            None => break,
        }
    }

    (!value.is_empty()).then_some(value)
}

/// is_session_cookie
///
/// True for `sb-*-auth-token` and for any of its numbered chunks.
pub fn is_session_cookie(name: &str) -> bool {
    if is_session_cookie_name(name) {
        return true;
    }
    name.rsplit_once('.')
        .is_some_and(|(base, index)| is_session_cookie_name(base) && index.parse::<u32>().is_ok())
}

/// decode_session_cookie
///
/// `base64-<payload>` values are base64-decoded first; anything else is parsed as JSON as-is.
pub fn decode_session_cookie(value: &str) -> Result<SessionCookie, SessionError> {
    let json = match value.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => decode_base64(encoded)?,
        None => value.as_bytes().to_vec(),
    };
    Ok(serde_json::from_slice(&json)?)
}

/// Convenience for callers that only want the token and do not care why it is missing.
pub fn session_access_token(cookies: &[Cookie<'_>]) -> Option<String> {
    let value = find_session_cookie(cookies)?;
    let session = decode_session_cookie(&value).ok()?;
    session.access_token().ok().flatten().map(str::to_string)
}

/// Parses every `Cookie` header on the request. Unparseable pairs are skipped.
pub fn request_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_owned()))
        .filter_map(Result::ok)
        .collect()
}

/// A scoped path is `/<segment>/<something>`; returns the segment.
fn scoped_user_id(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let (segment, tail) = rest.split_once('/')?;
    (!segment.is_empty() && !tail.is_empty()).then_some(segment)
}

pub fn classify_path<'a>(path: &'a str, public_paths: &[String]) -> RouteClass<'a> {
    if public_paths.iter().any(|public| public == path) {
        return RouteClass::Public;
    }
    match scoped_user_id(path) {
        Some(user_id) => RouteClass::Scoped { user_id },
        None => RouteClass::Other,
    }
}

/// is_routable
///
/// API routes, framework assets, the favicon and anything that looks like a file
/// (contains a dot) bypass the router entirely.
pub fn is_routable(path: &str) -> bool {
    let rest = path.strip_prefix('/').unwrap_or(path);
    !path.contains('.') && !UNROUTED_PREFIXES.iter().any(|prefix| rest.starts_with(prefix))
}

/// SessionRouter
///
/// The single enforcement point for per-user route isolation. Holds no per-request state:
/// every call to [`SessionRouter::route`] is an independent, synchronous computation over
/// the path and the cookies of one request.
#[derive(Clone)]
pub struct SessionRouter {
    public_paths: Vec<String>,
    home_section: String,
    verifier: TokenVerifier,
    anonymous: AnonymousPolicy,
}

impl SessionRouter {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self {
            public_paths: vec![ROOT_PATH.to_string()],
            home_section: HOME_SECTION.to_string(),
            verifier,
            anonymous: AnonymousPolicy::default(),
        }
    }

    pub fn with_anonymous_policy(mut self, policy: AnonymousPolicy) -> Self {
        self.anonymous = policy;
        self
    }

    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn anonymous_policy(&self) -> AnonymousPolicy {
        self.anonymous
    }

    /// `/<subject>/to-do`
    pub fn home_path(&self, subject: &str) -> String {
        format!("/{}/{}", subject, self.home_section)
    }

    /// read_session
    ///
    /// Cookie → decoded session → access token → subject. A missing cookie or a missing
    /// token is not an error (the visitor is anonymous); anything malformed on the way is.
    pub fn read_session(&self, cookies: &[Cookie<'_>]) -> Result<SessionState, SessionError> {
        let Some(value) = find_session_cookie(cookies) else {
            return Ok(SessionState::NoSession);
        };

        let session = decode_session_cookie(&value)?;
        let Some(token) = session.access_token()? else {
            return Ok(SessionState::NoSession);
        };

        Ok(match self.verifier.subject(token)? {
            Some(subject) => SessionState::Subject(subject),
            None => SessionState::NoSubject,
        })
    }

    /// decide
    ///
    /// Pure decision table:
    ///
    /// | session            | public path          | scoped `/A/..`            | other    |
    /// |--------------------|----------------------|---------------------------|----------|
    /// | `Subject(U)`       | redirect `/U/to-do`  | `A == U` continue, else `/` | continue |
    /// | `NoSubject`        | continue             | continue                  | continue |
    /// | `NoSession`        | continue             | per [`AnonymousPolicy`]   | continue |
    pub fn decide(&self, path: &str, state: &SessionState) -> RoutingDecision {
        match (state, classify_path(path, &self.public_paths)) {
            (SessionState::Subject(subject), RouteClass::Public) => {
                RoutingDecision::Redirect(self.home_path(subject))
            }
            (SessionState::Subject(subject), RouteClass::Scoped { user_id })
                if user_id != subject =>
            {
                RoutingDecision::Redirect(ROOT_PATH.to_string())
            }
            (SessionState::NoSession, RouteClass::Scoped { .. })
                if self.anonymous == AnonymousPolicy::Redirect =>
            {
                RoutingDecision::Redirect(ROOT_PATH.to_string())
            }
            _ => RoutingDecision::Continue,
        }
    }

    /// route
    ///
    /// Never fails. A cookie that cannot be read is logged and the request continues.
    pub fn route(&self, path: &str, cookies: &[Cookie<'_>]) -> RoutingDecision {
        match self.read_session(cookies) {
            Ok(state) => self.decide(path, &state),
            Err(error) => {
                tracing::warn!(%error, path, "could not read session cookie, passing request through");
                RoutingDecision::Continue
            }
        }
    }
}
