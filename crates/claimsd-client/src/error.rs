// ── Client and ensure error types ──
//
// Two vocabularies: `ClientError` for lifecycle/cache operations and
// `EnsureError` for claims evaluation. Transport failures surface only
// through `ClientError::Api` — the background refresh tasks never return
// them to callers (they retry internally, see the refresh engine).
// Both map onto the stable numeric codes in `status.rs`.

use thiserror::Error;

/// Errors returned by lifecycle and cache operations on a
/// [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The instance has not been initialized (or was uninitialized).
    #[error("not initialized")]
    NotInitialized,

    /// `initialize` was called while the instance is already active.
    #[error("already initialized")]
    AlreadyInitialized,

    /// A product-name filter was supplied but empty.
    #[error("invalid product name value")]
    InvalidProductName,

    /// A caller-supplied deadline elapsed.
    #[error("timeout")]
    Timeout,

    /// The caller's scope (or the instance scope) was cancelled while
    /// waiting. Distinct from [`Timeout`](Self::Timeout).
    #[error("cancelled")]
    Cancelled,

    /// Transport-level failure, surfaced only from synchronous fetch paths
    /// (never from the background refresh loop).
    #[error(transparent)]
    Api(#[from] claimsd_api::Error),
}

/// Errors returned by the ensure engine.
///
/// Texts follow the cross-boundary vocabulary in `status.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnsureError {
    #[error("ensure failed, product claim set not online")]
    OnlineCheckFailed,

    #[error("ensure failed, product claim set not trusted")]
    TrustCheckFailed,

    #[error("ensure failed, product entry not found")]
    ProductNotFound,

    #[error("ensure failed, product is not licensed")]
    ProductNotLicensed,

    #[error("ensure failed, product claim entry not found")]
    ClaimNotFound,

    #[error("ensure failed, product claim value type mismatch")]
    ClaimTypeMismatch,

    #[error("ensure failed, product claim value mismatch")]
    ClaimValueMismatch,

    #[error("ensure failed, unknown operator")]
    UnknownOperator,

    /// An ensure transaction handle was invalid. Only produced by
    /// cross-boundary binding layers that restore transactions by
    /// reference; kept here so the vocabulary is complete.
    #[error("ensure failed, invalid transaction")]
    InvalidTransaction,
}
