//! HTTP middleware stack for the marketplace API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers (CSP, nosniff, frame denial)
//! 4. Request ID (add unique ID to each request)
//! 5. Body limit (reject oversized payloads)
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Rate limiting (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
