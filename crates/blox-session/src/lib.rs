//! Session management for the wrapblox client
//!
//! Owns the primary session credential (the `.ROBLOSECURITY` cookie) and the
//! anti-forgery token required on state-mutating calls. The crate has no
//! knowledge of services or caching; the request executor in `blox-fetch`
//! drives it through three operations:
//!
//! 1. `Session::attach()` before each call, to obtain the cookie and (for
//!    mutating methods) the anti-forgery token
//! 2. `Session::refresh_after()` when upstream rejects the token, which
//!    collapses concurrent callers into one upstream mint
//! 3. `Session::refresh_detached()` for calls that act as a different
//!    identity and must not disturb shared state

pub mod constants;
pub mod error;
pub mod mint;
pub mod session;

pub use constants::*;
pub use error::{Error, Result};
pub use mint::mint_token;
pub use session::{AttachedCredentials, Session, TokenState};
