// ── Ensure engine ──
//
// Stateless evaluation of one product-claims snapshot against caller
// predicates. An `EnsureTransaction` pins a snapshot for the duration of a
// feature-gating decision: the snapshot reference is immutable, only the
// two enforcement flags are mutable. Every check fails closed against the
// pre-fetch default snapshot.

use std::str::FromStr;
use std::sync::Arc;

use claimsd_api::{ClaimValue, ProductClaims, ProductEntry};

use crate::error::EnsureError;

/// Comparison operator for the `ensure_*_with_operator` checks.
///
/// Wire tags (`gt`, `ge`, `lt`, `le`) are what binding layers pass across
/// boundaries; parsing any other tag fails with
/// [`EnsureError::UnknownOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GreaterThan,
    GreaterThanOrEqual,
    LesserThan,
    LesserThanOrEqual,
}

impl Operator {
    /// The wire tag for this operator.
    pub fn tag(self) -> &'static str {
        match self {
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
            Self::LesserThan => "lt",
            Self::LesserThanOrEqual => "le",
        }
    }

    fn holds<T: PartialOrd>(self, actual: T, expected: T) -> bool {
        match self {
            Self::GreaterThan => actual > expected,
            Self::GreaterThanOrEqual => actual >= expected,
            Self::LesserThan => actual < expected,
            Self::LesserThanOrEqual => actual <= expected,
        }
    }
}

impl FromStr for Operator {
    type Err = EnsureError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "gt" => Ok(Self::GreaterThan),
            "ge" => Ok(Self::GreaterThanOrEqual),
            "lt" => Ok(Self::LesserThan),
            "le" => Ok(Self::LesserThanOrEqual),
            _ => Err(EnsureError::UnknownOperator),
        }
    }
}

/// A short-lived evaluation handle over one product-claims snapshot.
///
/// Created by [`Client::begin_ensure`](crate::Client::begin_ensure) (or
/// directly from a snapshot). Callers hold it by value and drop it when the
/// decision is made; it has no persistent identity.
#[derive(Debug, Clone)]
pub struct EnsureTransaction {
    snapshot: Arc<ProductClaims>,
    must_be_online: bool,
    allow_untrusted: bool,
}

impl EnsureTransaction {
    /// Wrap a snapshot with default enforcement flags (`must_be_online`
    /// off, `allow_untrusted` off).
    pub fn new(snapshot: Arc<ProductClaims>) -> Self {
        Self {
            snapshot,
            must_be_online: false,
            allow_untrusted: false,
        }
    }

    /// Require the snapshot to be online for all product resolutions.
    pub fn set_must_be_online(&mut self, flag: bool) {
        self.must_be_online = flag;
    }

    /// Permit product resolutions against an untrusted snapshot.
    pub fn set_allow_untrusted(&mut self, flag: bool) {
        self.allow_untrusted = flag;
    }

    /// The snapshot this transaction evaluates against.
    pub fn snapshot(&self) -> &ProductClaims {
        &self.snapshot
    }

    /// JSON view of the snapshot, for dump tooling and binding layers.
    pub fn dump(&self) -> serde_json::Value {
        serde_json::to_value(&*self.snapshot).unwrap_or_default()
    }

    // ── Raw checks (always computed, flags do not apply) ────────────

    /// Fails if the snapshot was produced without live backend contact.
    pub fn ensure_online(&self) -> Result<(), EnsureError> {
        if self.snapshot.offline {
            return Err(EnsureError::OnlineCheckFailed);
        }
        Ok(())
    }

    /// Fails if the snapshot is not trusted.
    pub fn ensure_trusted(&self) -> Result<(), EnsureError> {
        if !self.snapshot.trusted {
            return Err(EnsureError::TrustCheckFailed);
        }
        Ok(())
    }

    /// Both checks, short-circuiting on the first failure.
    pub fn ensure_online_and_trusted(&self) -> Result<(), EnsureError> {
        self.ensure_online()?;
        self.ensure_trusted()?;
        Ok(())
    }

    // ── Product resolution ──────────────────────────────────────────

    /// Look up a product, applying the transaction's enforcement flags:
    /// online is enforced iff `must_be_online`, trust is enforced unless
    /// `allow_untrusted`.
    fn resolve_product(&self, product: &str) -> Result<&ProductEntry, EnsureError> {
        if self.must_be_online {
            self.ensure_online()?;
        }
        if !self.allow_untrusted {
            self.ensure_trusted()?;
        }

        self.snapshot
            .products
            .get(product)
            .ok_or(EnsureError::ProductNotFound)
    }

    /// Fails unless the product exists and is licensed.
    pub fn ensure_ok(&self, product: &str) -> Result<(), EnsureError> {
        let entry = self.resolve_product(product)?;
        if !entry.ok {
            return Err(EnsureError::ProductNotLicensed);
        }
        Ok(())
    }

    /// Resolve a claim value on a licensed product.
    fn claim_value(&self, product: &str, claim: &str) -> Result<&ClaimValue, EnsureError> {
        let entry = self.resolve_product(product)?;
        if !entry.ok {
            return Err(EnsureError::ProductNotLicensed);
        }

        entry.claims.get(claim).ok_or(EnsureError::ClaimNotFound)
    }

    // ── Typed getters ───────────────────────────────────────────────

    pub fn get_bool(&self, product: &str, claim: &str) -> Result<bool, EnsureError> {
        match self.claim_value(product, claim)? {
            ClaimValue::Bool(v) => Ok(*v),
            _ => Err(EnsureError::ClaimTypeMismatch),
        }
    }

    pub fn get_string(&self, product: &str, claim: &str) -> Result<&str, EnsureError> {
        match self.claim_value(product, claim)? {
            ClaimValue::String(v) => Ok(v),
            _ => Err(EnsureError::ClaimTypeMismatch),
        }
    }

    /// Integer getter. A float-encoded wire value is accepted and narrowed,
    /// since JSON carries no integer/float distinction.
    pub fn get_int64(&self, product: &str, claim: &str) -> Result<i64, EnsureError> {
        match self.claim_value(product, claim)? {
            ClaimValue::Int(v) => Ok(*v),
            #[allow(clippy::cast_possible_truncation)]
            ClaimValue::Float(v) => Ok(*v as i64),
            _ => Err(EnsureError::ClaimTypeMismatch),
        }
    }

    pub fn get_float64(&self, product: &str, claim: &str) -> Result<f64, EnsureError> {
        match self.claim_value(product, claim)? {
            ClaimValue::Float(v) => Ok(*v),
            _ => Err(EnsureError::ClaimTypeMismatch),
        }
    }

    pub fn get_string_array(&self, product: &str, claim: &str) -> Result<&[String], EnsureError> {
        match self.claim_value(product, claim)? {
            ClaimValue::StringArray(v) => Ok(v),
            _ => Err(EnsureError::ClaimTypeMismatch),
        }
    }

    // ── Typed equality ensures ──────────────────────────────────────

    pub fn ensure_bool(&self, product: &str, claim: &str, value: bool) -> Result<(), EnsureError> {
        if self.get_bool(product, claim)? != value {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    pub fn ensure_string(
        &self,
        product: &str,
        claim: &str,
        value: &str,
    ) -> Result<(), EnsureError> {
        if self.get_string(product, claim)? != value {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    pub fn ensure_int64(&self, product: &str, claim: &str, value: i64) -> Result<(), EnsureError> {
        if self.get_int64(product, claim)? != value {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    pub fn ensure_float64(
        &self,
        product: &str,
        claim: &str,
        value: f64,
    ) -> Result<(), EnsureError> {
        #[allow(clippy::float_cmp)]
        if self.get_float64(product, claim)? != value {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    // ── Operator comparisons ────────────────────────────────────────

    /// Fails with [`EnsureError::ClaimValueMismatch`] unless
    /// `actual <op> value` holds.
    pub fn ensure_int64_with_operator(
        &self,
        product: &str,
        claim: &str,
        value: i64,
        op: Operator,
    ) -> Result<(), EnsureError> {
        let actual = self.get_int64(product, claim)?;
        if !op.holds(actual, value) {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    /// Float variant of [`ensure_int64_with_operator`](Self::ensure_int64_with_operator).
    pub fn ensure_float64_with_operator(
        &self,
        product: &str,
        claim: &str,
        value: f64,
        op: Operator,
    ) -> Result<(), EnsureError> {
        let actual = self.get_float64(product, claim)?;
        if !op.holds(actual, value) {
            return Err(EnsureError::ClaimValueMismatch);
        }
        Ok(())
    }

    /// Fails unless every requested value appears in the claim's
    /// string-array value (subset containment, order-independent).
    pub fn ensure_string_array_values(
        &self,
        product: &str,
        claim: &str,
        values: &[&str],
    ) -> Result<(), EnsureError> {
        let actual = self.get_string_array(product, claim)?;
        for value in values {
            if !actual.iter().any(|a| a == value) {
                return Err(EnsureError::ClaimValueMismatch);
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn snapshot() -> Arc<ProductClaims> {
        let mut claims = HashMap::new();
        claims.insert("seats".to_owned(), ClaimValue::Int(10));
        claims.insert("ratio".to_owned(), ClaimValue::Float(0.75));
        claims.insert("edition".to_owned(), ClaimValue::String("pro".into()));
        claims.insert("multitenant".to_owned(), ClaimValue::Bool(true));
        claims.insert(
            "plugins".to_owned(),
            ClaimValue::StringArray(vec!["files".into(), "meet".into(), "chat".into()]),
        );

        let mut products = HashMap::new();
        products.insert("p".to_owned(), ProductEntry { ok: true, claims });
        products.insert(
            "expired".to_owned(),
            ProductEntry {
                ok: false,
                claims: HashMap::new(),
            },
        );

        Arc::new(ProductClaims {
            trusted: true,
            offline: false,
            products,
        })
    }

    fn tx() -> EnsureTransaction {
        EnsureTransaction::new(snapshot())
    }

    #[test]
    fn online_and_trusted_checks() {
        let tx = tx();
        assert!(tx.ensure_online().is_ok());
        assert!(tx.ensure_trusted().is_ok());
        assert!(tx.ensure_online_and_trusted().is_ok());

        let offline = EnsureTransaction::new(Arc::new(ProductClaims {
            trusted: false,
            offline: true,
            products: HashMap::new(),
        }));
        assert_eq!(offline.ensure_online(), Err(EnsureError::OnlineCheckFailed));
        assert_eq!(offline.ensure_trusted(), Err(EnsureError::TrustCheckFailed));
        assert_eq!(
            offline.ensure_online_and_trusted(),
            Err(EnsureError::OnlineCheckFailed)
        );
    }

    #[test]
    fn raw_checks_ignore_flags() {
        let mut tx = tx();
        tx.set_must_be_online(false);
        tx.set_allow_untrusted(true);

        let offline_untrusted = EnsureTransaction::new(Arc::new(ProductClaims {
            trusted: false,
            offline: true,
            products: HashMap::new(),
        }));
        // The raw checks are always computed, regardless of flags.
        assert!(offline_untrusted.ensure_online().is_err());
        assert!(offline_untrusted.ensure_trusted().is_err());
    }

    #[test]
    fn resolve_enforces_trust_unless_allowed() {
        let mut products = HashMap::new();
        products.insert(
            "p".to_owned(),
            ProductEntry {
                ok: true,
                claims: HashMap::new(),
            },
        );
        let untrusted = Arc::new(ProductClaims {
            trusted: false,
            offline: false,
            products,
        });

        let mut tx = EnsureTransaction::new(Arc::clone(&untrusted));
        assert_eq!(tx.ensure_ok("p"), Err(EnsureError::TrustCheckFailed));

        tx.set_allow_untrusted(true);
        assert!(tx.ensure_ok("p").is_ok());
    }

    #[test]
    fn resolve_enforces_online_only_when_required() {
        let mut products = HashMap::new();
        products.insert(
            "p".to_owned(),
            ProductEntry {
                ok: true,
                claims: HashMap::new(),
            },
        );
        let offline = Arc::new(ProductClaims {
            trusted: true,
            offline: true,
            products,
        });

        let mut tx = EnsureTransaction::new(Arc::clone(&offline));
        assert!(tx.ensure_ok("p").is_ok());

        tx.set_must_be_online(true);
        assert_eq!(tx.ensure_ok("p"), Err(EnsureError::OnlineCheckFailed));
    }

    #[test]
    fn ensure_ok_product_states() {
        let tx = tx();
        assert!(tx.ensure_ok("p").is_ok());
        assert_eq!(tx.ensure_ok("missing"), Err(EnsureError::ProductNotFound));
        assert_eq!(
            tx.ensure_ok("expired"),
            Err(EnsureError::ProductNotLicensed)
        );
    }

    #[test]
    fn typed_getters() {
        let tx = tx();
        assert_eq!(tx.get_bool("p", "multitenant"), Ok(true));
        assert_eq!(tx.get_string("p", "edition"), Ok("pro"));
        assert_eq!(tx.get_int64("p", "seats"), Ok(10));
        assert_eq!(tx.get_float64("p", "ratio"), Ok(0.75));
        assert_eq!(
            tx.get_string_array("p", "plugins").map(<[String]>::len),
            Ok(3)
        );

        assert_eq!(
            tx.get_bool("p", "nope"),
            Err(EnsureError::ClaimNotFound)
        );
        assert_eq!(
            tx.get_string("p", "seats"),
            Err(EnsureError::ClaimTypeMismatch)
        );
    }

    #[test]
    fn int64_narrows_float_encoded_values() {
        let tx = tx();
        assert_eq!(tx.get_int64("p", "ratio"), Ok(0));
    }

    #[test]
    fn equality_ensures() {
        let tx = tx();
        assert!(tx.ensure_bool("p", "multitenant", true).is_ok());
        assert!(tx.ensure_string("p", "edition", "pro").is_ok());
        assert!(tx.ensure_int64("p", "seats", 10).is_ok());
        assert!(tx.ensure_float64("p", "ratio", 0.75).is_ok());

        assert_eq!(
            tx.ensure_int64("p", "seats", 11),
            Err(EnsureError::ClaimValueMismatch)
        );
        assert_eq!(
            tx.ensure_string("p", "edition", "basic"),
            Err(EnsureError::ClaimValueMismatch)
        );
    }

    #[test]
    fn operator_comparisons() {
        let tx = tx();
        assert!(tx
            .ensure_int64_with_operator("p", "seats", 5, Operator::GreaterThan)
            .is_ok());
        assert!(tx
            .ensure_int64_with_operator("p", "seats", 10, Operator::GreaterThanOrEqual)
            .is_ok());
        assert_eq!(
            tx.ensure_int64_with_operator("p", "seats", 10, Operator::LesserThan),
            Err(EnsureError::ClaimValueMismatch)
        );
        assert!(tx
            .ensure_float64_with_operator("p", "ratio", 1.0, Operator::LesserThan)
            .is_ok());
        assert_eq!(
            tx.ensure_float64_with_operator("p", "ratio", 0.5, Operator::LesserThanOrEqual),
            Err(EnsureError::ClaimValueMismatch)
        );
    }

    #[test]
    fn operator_tags_round_trip() {
        for op in [
            Operator::GreaterThan,
            Operator::GreaterThanOrEqual,
            Operator::LesserThan,
            Operator::LesserThanOrEqual,
        ] {
            assert_eq!(op.tag().parse::<Operator>(), Ok(op));
        }
        assert_eq!(
            "lte".parse::<Operator>(),
            Err(EnsureError::UnknownOperator)
        );
    }

    #[test]
    fn string_array_subset_containment() {
        let tx = tx();
        assert!(tx.ensure_string_array_values("p", "plugins", &[]).is_ok());
        assert!(tx
            .ensure_string_array_values("p", "plugins", &["meet", "files"])
            .is_ok());
        assert_eq!(
            tx.ensure_string_array_values("p", "plugins", &["files", "calendar"]),
            Err(EnsureError::ClaimValueMismatch)
        );
    }

    #[test]
    fn default_snapshot_fails_closed() {
        let tx = EnsureTransaction::new(Arc::new(ProductClaims::default()));
        assert!(tx.ensure_online().is_err());
        assert!(tx.ensure_trusted().is_err());
        assert_eq!(tx.ensure_ok("p"), Err(EnsureError::TrustCheckFailed));

        let mut tx = tx;
        tx.set_allow_untrusted(true);
        assert_eq!(tx.ensure_ok("p"), Err(EnsureError::ProductNotFound));
    }

    #[test]
    fn dump_mirrors_snapshot() {
        let tx = tx();
        let dump = tx.dump();
        assert_eq!(dump["trusted"], true);
        assert_eq!(dump["products"]["p"]["ok"], true);
        assert_eq!(dump["products"]["p"]["claims"]["seats"], 10);
    }
}
