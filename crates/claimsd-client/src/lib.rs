//! Client-side claims engine for products licensed through a local claims
//! service.
//!
//! This crate owns the client lifecycle, the cached claims snapshot, and
//! the ensure engine on top of `claimsd-api`:
//!
//! - **[`Client`]** — Central facade managing the full lifecycle:
//!   [`initialize()`](Client::initialize) selects the endpoint and spawns
//!   background tasks that keep an aggregated [`ProductClaims`] snapshot
//!   fresh; [`wait_until_ready()`](Client::wait_until_ready) gates on the
//!   first successful fetch. [`Client::oneshot()`] provides a lightweight
//!   fire-and-forget mode for single CLI invocations.
//!
//! - **Claims cache** — [`current_product_claims()`](Client::current_product_claims)
//!   hands out the snapshot non-blocking;
//!   [`current_claims()`](Client::current_claims) lazily fetches the raw
//!   active-claims payload with single-flight deduplication.
//!
//! - **[`EnsureTransaction`]** — Pure evaluation over one pinned snapshot:
//!   typed claim getters plus ensure operations that fail closed with
//!   [`EnsureError`] values carrying stable numeric [`StatusCode`]s.
//!
//! - **Update notifications** —
//!   [`notify_when_updated()`](Client::notify_when_updated) pushes one
//!   message per successful refresh into a caller-supplied channel.

pub mod client;
pub mod config;
pub mod ensure;
pub mod error;
pub mod status;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::Client;
pub use config::ClientConfig;
pub use ensure::{EnsureTransaction, Operator};
pub use error::{ClientError, EnsureError};
pub use status::StatusCode;

// Re-export the wire-facing types callers handle directly.
pub use claimsd_api::{ActiveClaims, ClaimValue, Endpoint, ProductClaims, ProductEntry};
