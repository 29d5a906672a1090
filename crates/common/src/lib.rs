//! Types shared across the wrapblox crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
