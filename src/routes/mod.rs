/// Router Module Index
///
/// Routes are split by access level so the authentication layer is applied once per
/// module rather than per handler.

/// Routes reachable without an API identity: health, landing, auth endpoints and the
/// scoped pages (which run their own identity check and redirect).
pub mod public;

/// `/api/*` routes behind the `AuthUser` layer.
pub mod authenticated;
