//! JWT authentication and the session lifecycle.
//!
//! Dual-token system: short-lived access tokens (10 min, stateless, carried
//! as a bearer header) and long-lived refresh tokens (1 year, stored per
//! user, carried in an HTTP-only cookie). Refresh tokens are rotated on
//! every use; presenting a spent token revokes every session for the
//! account.

mod cookie;
mod errors;
mod extractors;
mod session;
mod state;

pub use cookie::{CookieConfig, DEFAULT_COOKIE_NAME, PARTITIONED_COOKIE_NAME, get_cookie};
pub use errors::AuthError;
pub use extractors::Auth;
pub use session::{SessionError, SessionService, SessionTokens};
pub use state::HasAuthBackend;
