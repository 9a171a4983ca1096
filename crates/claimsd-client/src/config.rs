// ── Client configuration ──
//
// Plain in-process settings for a single client instance. There is no
// config-file layer here — embedding products construct a `ClientConfig`
// and hand it in.

use url::Url;

/// Configuration for a claims [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Keep the cached snapshot fresh via the claims-watch subscription.
    /// When off, exactly one fetch happens per initialization.
    pub auto_refresh: bool,

    /// Emit debug-level log lines for fetches, watch events, and retries.
    pub debug: bool,

    /// Product tag prepended to the library HTTP user agent.
    pub product_user_agent: Option<String>,

    /// Explicit endpoint override. `None` resolves via the
    /// `CLAIMSD_ENDPOINT` environment variable or the built-in default.
    /// Any override marks the resulting claims data untrusted.
    pub endpoint: Option<Url>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            debug: false,
            product_user_agent: None,
            endpoint: None,
        }
    }
}
