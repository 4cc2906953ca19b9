//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with an empty `request_id` field)
//! 3. Request ID
//! 4. Security headers (no caching, no framing, noindex)
//! 5. Session layer (`tower_sessions.admin_session`, signed cookie)
//!
//! Authorization is not a layer: protected handlers take a [`RequireAdmin`]
//! argument, which re-checks the admin flag against the database.

pub mod auth;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAdmin, RequireAdmin, clear_current_admin, set_current_admin};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SessionLayer, create_session_layer, session_store};
