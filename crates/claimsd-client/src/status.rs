// ── Stable numeric status vocabulary ──
//
// Every error kind has a fixed numeric code and a human-readable text,
// intended for cross-boundary (foreign-function) consumption. The values
// are ABI-stable: lifecycle codes live in the 0x100 block, ensure codes in
// the 0x10000 block. Do not renumber.

use std::fmt;

use crate::error::{ClientError, EnsureError};

/// Numeric status code as exported across process/runtime boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum StatusCode {
    /// Success; not an error.
    Success = 0,

    // ── Lifecycle block ─────────────────────────────────────────────
    /// Catch-all for unclassified failures (e.g. transport errors).
    Unknown = 0x101,
    InvalidProductName = 0x102,
    AlreadyInitialized = 0x103,
    NotInitialized = 0x104,
    Timeout = 0x105,

    // ── Ensure block ────────────────────────────────────────────────
    OnlineCheckFailed = 0x1_0001,
    TrustCheckFailed = 0x1_0002,
    ProductNotFound = 0x1_0003,
    ProductNotLicensed = 0x1_0004,
    ClaimNotFound = 0x1_0005,
    ClaimTypeMismatch = 0x1_0006,
    ClaimValueMismatch = 0x1_0007,
    UnknownOperator = 0x1_0008,
    InvalidTransaction = 0x1_0009,
}

impl StatusCode {
    /// All codes, in numeric order. Drives the `claimsd errors` table.
    pub const ALL: [StatusCode; 15] = [
        StatusCode::Success,
        StatusCode::Unknown,
        StatusCode::InvalidProductName,
        StatusCode::AlreadyInitialized,
        StatusCode::NotInitialized,
        StatusCode::Timeout,
        StatusCode::OnlineCheckFailed,
        StatusCode::TrustCheckFailed,
        StatusCode::ProductNotFound,
        StatusCode::ProductNotLicensed,
        StatusCode::ClaimNotFound,
        StatusCode::ClaimTypeMismatch,
        StatusCode::ClaimValueMismatch,
        StatusCode::UnknownOperator,
        StatusCode::InvalidTransaction,
    ];

    /// The numeric value of this code.
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Reverse lookup from a numeric value.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Human-readable text for this code.
    pub fn text(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown",
            Self::InvalidProductName => "Invalid Product Name Value",
            Self::AlreadyInitialized => "Already Initialized",
            Self::NotInitialized => "Not Initialized",
            Self::Timeout => "Timeout",
            Self::OnlineCheckFailed => "Ensure failed, product claim set not online",
            Self::TrustCheckFailed => "Ensure failed, product claim set not trusted",
            Self::ProductNotFound => "Ensure failed, product entry not found",
            Self::ProductNotLicensed => "Ensure failed, product is not licensed",
            Self::ClaimNotFound => "Ensure failed, product claim entry not found",
            Self::ClaimTypeMismatch => "Ensure failed, product claim value type mismatch",
            Self::ClaimValueMismatch => "Ensure failed, product claim value mismatch",
            Self::UnknownOperator => "Ensure failed, unknown operator",
            Self::InvalidTransaction => "Ensure failed, invalid transaction",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (:0x{:x})", self.text(), self.code())
    }
}

impl From<&ClientError> for StatusCode {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::NotInitialized => Self::NotInitialized,
            ClientError::AlreadyInitialized => Self::AlreadyInitialized,
            ClientError::InvalidProductName => Self::InvalidProductName,
            ClientError::Timeout => Self::Timeout,
            // Cancellation has no entry in the exported table; like any
            // unclassified failure it maps to the catch-all.
            ClientError::Cancelled | ClientError::Api(_) => Self::Unknown,
        }
    }
}

impl From<&EnsureError> for StatusCode {
    fn from(err: &EnsureError) -> Self {
        match err {
            EnsureError::OnlineCheckFailed => Self::OnlineCheckFailed,
            EnsureError::TrustCheckFailed => Self::TrustCheckFailed,
            EnsureError::ProductNotFound => Self::ProductNotFound,
            EnsureError::ProductNotLicensed => Self::ProductNotLicensed,
            EnsureError::ClaimNotFound => Self::ClaimNotFound,
            EnsureError::ClaimTypeMismatch => Self::ClaimTypeMismatch,
            EnsureError::ClaimValueMismatch => Self::ClaimValueMismatch,
            EnsureError::UnknownOperator => Self::UnknownOperator,
            EnsureError::InvalidTransaction => Self::InvalidTransaction,
        }
    }
}
