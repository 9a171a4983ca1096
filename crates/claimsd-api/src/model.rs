// ── Wire payload types ──
//
// Shapes of the claims service responses. `ProductClaims` is the aggregated
// per-product snapshot, `ActiveClaims` is the opaque secondary payload. Both
// are plain serde types; the client crate wraps them in `Arc` snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single claim value as it appears on the wire.
///
/// Untagged: the JSON shape alone decides the variant. Integral numbers
/// decode as `Int`, everything else numeric as `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    StringArray(Vec<String>),
}

/// One product's entry inside the aggregated snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub ok: bool,
    #[serde(default)]
    pub claims: HashMap<String, ClaimValue>,
}

/// The aggregated product-claims snapshot as returned by
/// `GET /api/v1/claims/products`.
///
/// `Default` is the safe pre-fetch value: offline, untrusted, no products.
/// Every ensure check fails closed against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductClaims {
    pub trusted: bool,
    pub offline: bool,
    #[serde(default)]
    pub products: HashMap<String, ProductEntry>,
}

impl Default for ProductClaims {
    fn default() -> Self {
        Self {
            trusted: false,
            offline: true,
            products: HashMap::new(),
        }
    }
}

/// The opaque "active claims" payload from `GET /api/v1/claims`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActiveClaims(pub serde_json::Value);

impl ActiveClaims {
    /// The raw payload, for dumping or embedding-layer serialization.
    pub fn dump(&self) -> &serde_json::Value {
        &self.0
    }
}
