// ── Endpoint selection ──
//
// The claims service listens on a fixed local endpoint. Which endpoint a
// client talks to determines how much the resulting claims data is trusted:
// only the built-in default counts as trusted, any override (environment or
// explicit) marks everything fetched through it untrusted.

use url::Url;

use crate::error::Error;

/// The built-in, trusted claims service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8574";

/// Environment variable naming an alternate endpoint. Setting it marks the
/// resulting claims data untrusted.
pub const ENDPOINT_ENV: &str = "CLAIMSD_ENDPOINT";

/// A resolved claims service endpoint plus its trust level.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base: Url,
    pub trusted: bool,
}

impl Endpoint {
    /// Resolve the endpoint to use.
    ///
    /// Precedence: explicit override > `CLAIMSD_ENDPOINT` > built-in default.
    /// Only the default is trusted.
    pub fn select(explicit: Option<&Url>) -> Result<Self, Error> {
        let env = std::env::var(ENDPOINT_ENV).ok();
        Self::resolve(explicit, env.as_deref())
    }

    fn resolve(explicit: Option<&Url>, env: Option<&str>) -> Result<Self, Error> {
        if let Some(base) = explicit {
            return Ok(Self {
                base: base.clone(),
                trusted: false,
            });
        }

        if let Some(value) = env {
            if !value.is_empty() {
                let base = Url::parse(value)?;
                return Ok(Self {
                    base,
                    trusted: false,
                });
            }
        }

        Ok(Self {
            base: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint URL is valid"),
            trusted: true,
        })
    }

    /// Join a service path onto the endpoint base.
    pub(crate) fn join(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base.join(path)?)
    }
}
