//! Request core for the wrapblox client
//!
//! Every typed entity call goes through the `Fetcher`, which presents one
//! calling contract over all upstream services:
//!
//! - `router` maps logical service names ("Users", "Badges", ...) to base URLs
//! - `descriptor` builds immutable request descriptors and their cache
//!   fingerprints
//! - `cache` stores decoded responses with a deployment-wide TTL
//! - `classify` maps upstream failures onto the closed `ErrorKind` taxonomy
//! - `executor` runs one descriptor: cache check, credential attachment,
//!   anti-forgery refresh, rate-limit backoff
//! - `pagination` aggregates cursor-paged list endpoints up to a limit
//!
//! Session state lives in `blox-session`; the fetcher owns one `Session`.

pub mod cache;
pub mod classify;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pagination;
pub mod router;

#[cfg(test)]
mod test_support;

pub use cache::{CacheEntry, CacheStore, Invalidation};
pub use config::FetchConfig;
pub use descriptor::{Fingerprint, RequestDescriptor, RequestOptions};
pub use error::{ErrorKind, ErrorRecord, Result};
pub use executor::Fetcher;
pub use pagination::{Page, envelope_page};
pub use router::ServiceRouter;

pub use reqwest::Method;
