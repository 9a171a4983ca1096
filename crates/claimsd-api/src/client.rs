// claimsd HTTP client
//
// Wraps `reqwest::Client` with claims-service URL construction and response
// decoding. The push-event subscription lives in `events.rs`; this module
// stays focused on request/response mechanics.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::model::{ActiveClaims, ProductClaims};

/// HTTP user agent sent with every request created by this library.
pub const DEFAULT_USER_AGENT: &str = concat!("claimsd-client/", env!("CARGO_PKG_VERSION"));

const CLAIMS_PATH: &str = "/api/v1/claims";
const PRODUCTS_PATH: &str = "/api/v1/claims/products";
pub(crate) const WATCH_PATH: &str = "/api/v1/claims/watch";

/// Raw HTTP client for the claims service.
///
/// Carries the resolved [`Endpoint`] and an optional product user-agent tag
/// that embedding products prepend to the library identifier.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl ApiClient {
    /// Create a client for the given endpoint.
    ///
    /// `product_user_agent` is prepended to the default library user agent,
    /// e.g. `"groupware/5.2 claimsd-client/0.1.0"`.
    pub fn new(endpoint: Endpoint, product_user_agent: Option<&str>) -> Result<Self, Error> {
        let user_agent = match product_user_agent {
            Some(tag) => format!("{tag} {DEFAULT_USER_AGENT}"),
            None => DEFAULT_USER_AGENT.to_owned(),
        };

        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self { http, endpoint })
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build a service URL, optionally scoped to a single product.
    pub(crate) fn service_url(&self, path: &str, product: Option<&str>) -> Result<Url, Error> {
        let mut url = self.endpoint.join(path)?;
        if let Some(name) = product {
            url.query_pairs_mut().append_pair("product", name);
        }
        Ok(url)
    }

    // ── Fetches ──────────────────────────────────────────────────────

    /// Fetch the aggregated product-claims snapshot.
    pub async fn fetch_product_claims(
        &self,
        product: Option<&str>,
    ) -> Result<ProductClaims, Error> {
        let url = self.service_url(PRODUCTS_PATH, product)?;
        self.get(url).await
    }

    /// Fetch the opaque active-claims payload.
    pub async fn fetch_claims(&self) -> Result<ActiveClaims, Error> {
        let url = self.service_url(CLAIMS_PATH, None)?;
        self.get(url).await
    }

    /// Send a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
