//! Async HTTP transport for the local claimsd claims service.
//!
//! This crate is the transport adapter: it knows how to find the service
//! endpoint (and what that choice means for trust), fetch the two claims
//! payloads, and subscribe to the claims-watch push-event stream. All
//! caching, refresh scheduling, and claims evaluation live in
//! `claimsd-client`.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod model;

pub use client::{ApiClient, DEFAULT_USER_AGENT};
pub use endpoint::{DEFAULT_ENDPOINT, ENDPOINT_ENV, Endpoint};
pub use error::Error;
pub use events::{ClaimsEvent, EVENT_CLAIMS_UPDATED, EVENT_HELLO};
pub use model::{ActiveClaims, ClaimValue, ProductClaims, ProductEntry};
