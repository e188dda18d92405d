use axum::http::{HeaderMap, HeaderValue, header};
use axum_extra::extract::cookie::Cookie;
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use sta_clara::session::{
    AnonymousPolicy, RouteClass, RoutingDecision, SessionError, SessionRouter, SessionState,
    TokenVerifier, classify_path, decode_session_cookie, find_session_cookie, is_routable,
    is_session_cookie, request_cookies,
};
use std::time::SystemTime;

// --- Helpers ---

const SECRET: &str = "session-router-test-secret";
const COOKIE: &str = "sb-abcdefgh-auth-token";
const USER: &str = "3f1c2a9e-7b44-4d0e-9a55-0c6f1e2d8b71";
const OTHER: &str = "8d2e5b10-1c3f-4a7e-b6d9-2f0a9c4e7d35";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn signed_token(claims: serde_json::Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn token_for(sub: &str) -> String {
    signed_token(json!({ "sub": sub, "aud": "authenticated", "exp": now() + 3600 }))
}

/// `base64-` + base64url(JSON), the shape written at login.
fn session_value(access_token: &str) -> String {
    let json = json!({ "access_token": access_token, "refresh_token": "r", "token_type": "bearer" });
    format!("base64-{}", URL_SAFE_NO_PAD.encode(json.to_string()))
}

fn cookies_for(sub: &str) -> Vec<Cookie<'static>> {
    vec![Cookie::new(COOKIE, session_value(&token_for(sub)))]
}

fn verifying_router() -> SessionRouter {
    SessionRouter::new(TokenVerifier::hs256(SECRET))
}

fn redirect(to: &str) -> RoutingDecision {
    RoutingDecision::Redirect(to.to_string())
}

// --- Routing table ---

#[test]
fn signed_in_visitor_on_root_goes_to_their_todo_list() {
    let router = verifying_router();
    assert_eq!(
        router.route("/", &cookies_for(USER)),
        redirect(&format!("/{}/to-do", USER))
    );
}

#[test]
fn signed_in_visitor_on_foreign_scoped_path_goes_to_root() {
    let router = verifying_router();
    let path = format!("/{}/notes", OTHER);
    assert_eq!(router.route(&path, &cookies_for(USER)), redirect("/"));
}

#[test]
fn signed_in_visitor_on_own_scoped_path_continues() {
    let router = verifying_router();
    for section in ["to-do", "notes", "drive", "food", "pokemon", "anything/deeper"] {
        let path = format!("/{}/{}", USER, section);
        assert_eq!(
            router.route(&path, &cookies_for(USER)),
            RoutingDecision::Continue,
            "{}",
            path
        );
    }
}

#[test]
fn anonymous_visitor_on_root_continues() {
    let router = verifying_router();
    assert_eq!(router.route("/", &[]), RoutingDecision::Continue);
}

#[test]
fn anonymous_visitor_on_scoped_path_follows_policy() {
    let path = format!("/{}/to-do", USER);

    let pass = verifying_router();
    assert_eq!(pass.anonymous_policy(), AnonymousPolicy::PassThrough);
    assert_eq!(pass.route(&path, &[]), RoutingDecision::Continue);

    let strict = verifying_router().with_anonymous_policy(AnonymousPolicy::Redirect);
    assert_eq!(strict.route(&path, &[]), redirect("/"));
    // Public and unscoped paths are unaffected by the policy.
    assert_eq!(strict.route("/", &[]), RoutingDecision::Continue);
    assert_eq!(strict.route("/about", &[]), RoutingDecision::Continue);
}

#[test]
fn paths_that_are_neither_public_nor_scoped_continue() {
    let router = verifying_router();
    let paths = vec![
        "/about".to_string(),
        "/settings".to_string(),
        format!("/{}", OTHER),
        format!("/{}/", OTHER),
    ];
    for path in &paths {
        assert_eq!(
            router.route(path, &cookies_for(USER)),
            RoutingDecision::Continue,
            "{}",
            path
        );
    }
}

#[test]
fn token_without_subject_never_redirects() {
    let router = verifying_router();
    let token = signed_token(json!({ "aud": "authenticated", "exp": now() + 3600 }));
    let cookies = vec![Cookie::new(COOKIE, session_value(&token))];

    assert_eq!(
        router.read_session(&cookies).unwrap(),
        SessionState::NoSubject
    );
    assert_eq!(router.route("/", &cookies), RoutingDecision::Continue);
    let path = format!("/{}/notes", OTHER);
    assert_eq!(router.route(&path, &cookies), RoutingDecision::Continue);

    // Even with the strict policy: a token is present, so the visitor is not anonymous.
    let strict = verifying_router().with_anonymous_policy(AnonymousPolicy::Redirect);
    assert_eq!(strict.route(&path, &cookies), RoutingDecision::Continue);
}

#[test]
fn session_without_access_token_is_anonymous() {
    let router = verifying_router();
    for payload in [json!({}), json!({ "access_token": "" }), json!({ "access_token": null })] {
        let value = format!("base64-{}", URL_SAFE_NO_PAD.encode(payload.to_string()));
        let cookies = vec![Cookie::new(COOKIE, value)];
        assert_eq!(
            router.read_session(&cookies).unwrap(),
            SessionState::NoSession
        );
        assert_eq!(router.route("/", &cookies), RoutingDecision::Continue);
    }
}

// --- Fail-open ---

#[test]
fn malformed_cookies_fail_open() {
    let router = verifying_router().with_anonymous_policy(AnonymousPolicy::Redirect);
    let scoped = format!("/{}/to-do", USER);

    let not_base64 = vec![Cookie::new(COOKIE, "base64-!!!not*base64!!!")];
    let not_json = vec![Cookie::new(
        COOKIE,
        format!("base64-{}", URL_SAFE_NO_PAD.encode("not json")),
    )];
    let token_not_string = vec![Cookie::new(
        COOKIE,
        format!(
            "base64-{}",
            URL_SAFE_NO_PAD.encode(json!({ "access_token": 42 }).to_string())
        ),
    )];
    let token_not_jwt = vec![Cookie::new(COOKIE, session_value("definitely-not-a-jwt"))];

    for cookies in [not_base64, not_json, token_not_string, token_not_jwt] {
        assert!(router.read_session(&cookies).is_err());
        assert_eq!(router.route("/", &cookies), RoutingDecision::Continue);
        assert_eq!(router.route(&scoped, &cookies), RoutingDecision::Continue);
    }
}

#[test]
fn read_session_reports_the_failing_stage() {
    let router = verifying_router();

    let err = router
        .read_session(&[Cookie::new(COOKIE, "base64-%%%")])
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidBase64(_)));

    let err = router
        .read_session(&[Cookie::new(COOKIE, "{not json")])
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidJson(_)));

    let payload = json!({ "access_token": ["a"] }).to_string();
    let err = router
        .read_session(&[Cookie::new(COOKIE, payload)])
        .unwrap_err();
    assert!(matches!(err, SessionError::MalformedAccessToken));
}

// --- Token verification ---

#[test]
fn forged_token_is_ignored_when_verifying() {
    let forged = encode(
        &Header::default(),
        &json!({ "sub": USER, "exp": now() + 3600 }),
        &EncodingKey::from_secret(b"attacker-chosen-secret"),
    )
    .unwrap();
    let cookies = vec![Cookie::new(COOKIE, session_value(&forged))];

    let router = verifying_router();
    assert!(matches!(
        router.read_session(&cookies),
        Err(SessionError::TokenRejected(_))
    ));
    assert_eq!(router.route("/", &cookies), RoutingDecision::Continue);
}

#[test]
fn expired_token_is_ignored_when_verifying() {
    let expired = signed_token(json!({ "sub": USER, "exp": now() - 3600 }));
    let cookies = vec![Cookie::new(COOKIE, session_value(&expired))];
    assert_eq!(
        verifying_router().route("/", &cookies),
        RoutingDecision::Continue
    );
}

#[test]
fn decode_only_mode_trusts_any_well_formed_token() {
    let router = SessionRouter::new(TokenVerifier::Unverified);

    // Unsigned, hand-assembled token: header.payload.signature
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": USER }).to_string());
    let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload);
    let cookies = vec![Cookie::new(COOKIE, session_value(&token))];

    assert_eq!(
        router.route("/", &cookies),
        redirect(&format!("/{}/to-do", USER))
    );

    let two_segments = vec![Cookie::new(COOKIE, session_value("abc.def"))];
    assert!(matches!(
        router.read_session(&two_segments),
        Err(SessionError::MalformedToken(_))
    ));

    let numeric_sub = URL_SAFE_NO_PAD.encode(json!({ "sub": 7 }).to_string());
    let cookies = vec![Cookie::new(
        COOKIE,
        session_value(&format!("h.{}.s", numeric_sub)),
    )];
    assert!(matches!(
        router.read_session(&cookies),
        Err(SessionError::MalformedSubject)
    ));
}

// --- Cookie decoding ---

#[test]
fn cookie_value_may_be_raw_json_or_padded_standard_base64() {
    let router = verifying_router();
    let token = token_for(USER);
    let raw = json!({ "access_token": token }).to_string();

    let padded = format!("base64-{}", STANDARD.encode(&raw));
    for value in [raw.clone(), padded] {
        let cookies = vec![Cookie::new(COOKIE, value)];
        assert_eq!(
            router.read_session(&cookies).unwrap(),
            SessionState::Subject(USER.to_string())
        );
    }

    let decoded = decode_session_cookie(&raw).unwrap();
    assert_eq!(decoded.access_token().unwrap(), Some(token.as_str()));
}

#[test]
fn first_matching_cookie_wins_and_others_are_ignored() {
    let cookies = vec![
        Cookie::new("theme", "dark"),
        Cookie::new("sb-abcdefgh-auth-token-code-verifier", "x"),
        Cookie::new(COOKIE, "first"),
        Cookie::new("sb-other-auth-token", "second"),
    ];
    assert_eq!(find_session_cookie(&cookies).as_deref(), Some("first"));
    assert_eq!(find_session_cookie(&[Cookie::new("theme", "dark")]), None);
}

#[test]
fn chunked_session_cookies_are_reassembled_in_order() {
    let value = session_value(&token_for(USER));
    let (head, tail) = value.split_at(value.len() / 2);
    let cookies = vec![
        Cookie::new(format!("{}.1", COOKIE), tail.to_string()),
        Cookie::new(format!("{}.0", COOKIE), head.to_string()),
    ];

    assert_eq!(find_session_cookie(&cookies), Some(value));
    assert_eq!(
        verifying_router().route("/", &cookies),
        redirect(&format!("/{}/to-do", USER))
    );
}

#[test]
fn request_cookies_reads_every_cookie_header() {
    let mut headers = HeaderMap::new();
    headers.append(header::COOKIE, HeaderValue::from_static("a=1; b=2"));
    headers.append(header::COOKIE, HeaderValue::from_static("sb-x-auth-token=v"));

    let cookies = request_cookies(&headers);
    let names: Vec<&str> = cookies.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["a", "b", "sb-x-auth-token"]);
    assert_eq!(find_session_cookie(&cookies).as_deref(), Some("v"));
}

#[test]
fn is_session_cookie_accepts_chunks() {
    assert!(is_session_cookie(COOKIE));
    assert!(is_session_cookie(&format!("{COOKIE}.0")));
    assert!(is_session_cookie(&format!("{COOKIE}.12")));
    assert!(is_session_cookie("sb-other-auth-token"));
    assert!(!is_session_cookie(&format!("{COOKIE}.x")));
    assert!(!is_session_cookie("theme"));
    assert!(!is_session_cookie("sb-x-auth-token-extra"));
}

// --- Path classification ---

#[test]
fn classify_path_matches_scoped_pattern() {
    let public = vec!["/".to_string()];
    assert_eq!(classify_path("/", &public), RouteClass::Public);
    assert_eq!(
        classify_path("/abc/to-do", &public),
        RouteClass::Scoped { user_id: "abc" }
    );
    assert_eq!(
        classify_path("/abc/x/y", &public),
        RouteClass::Scoped { user_id: "abc" }
    );
    assert_eq!(classify_path("/abc", &public), RouteClass::Other);
    assert_eq!(classify_path("/abc/", &public), RouteClass::Other);
    assert_eq!(classify_path("//to-do", &public), RouteClass::Other);
}

#[test]
fn public_paths_are_configurable() {
    let router = verifying_router().with_public_paths(["/", "/welcome"]);
    assert_eq!(
        router.route("/welcome", &cookies_for(USER)),
        redirect(&format!("/{}/to-do", USER))
    );
}

#[test]
fn applicability_filter_skips_api_assets_and_files() {
    for path in [
        "/api/tasks",
        "/api",
        "/_next/static/chunk.js",
        "/_next/image",
        "/favicon.ico",
        "/public/logo",
        "/robots.txt",
        "/u/photo.png",
    ] {
        assert!(!is_routable(path), "{} should be skipped", path);
    }
    for path in ["/", "/abc/to-do", "/login", "/abc/notes"] {
        assert!(is_routable(path), "{} should be routed", path);
    }
}
