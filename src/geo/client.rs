use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{CountryLookup, GeoIdentity};
use crate::config::GeoConfig;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geolocation API key is missing")]
    MissingApiKey,
    #[error("invalid geolocation endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("geolocation request timed out after {0:?}")]
    Timeout(Duration),
    #[error("geolocation request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("geolocation service returned {0}")]
    Status(StatusCode),
    #[error("invalid geolocation response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("geolocation response has an empty country code")]
    EmptyCountryCode,
    #[error("geolocation request limiter was closed")]
    LimiterClosed,
}

/// Per-call bounds for the two lookup shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoTimeouts {
    pub address: Duration,
    pub domain: Duration,
}

impl Default for GeoTimeouts {
    fn default() -> Self {
        Self {
            address: Duration::from_secs(3),
            domain: Duration::from_secs(5),
        }
    }
}

impl GeoTimeouts {
    pub fn for_identity(&self, identity: &GeoIdentity) -> Duration {
        match identity {
            GeoIdentity::Address(_) => self.address,
            GeoIdentity::Domain(_) => self.domain,
        }
    }
}

/// Only the field we need from either endpoint.
#[derive(Debug, Deserialize)]
struct CountryBody {
    country_code: String,
}

/// HTTP client for the address and domain geolocation endpoints.
///
/// Results are never cached; the same identity asked twice makes two calls.
pub struct GeolocationClient {
    client: Client,
    api_key: String,
    address_endpoint: Url,
    domain_endpoint: Url,
    timeouts: GeoTimeouts,
    permits: Arc<Semaphore>,
}

impl GeolocationClient {
    /// Build a client, failing immediately when the API key is absent.
    pub fn from_config(config: &GeoConfig) -> Result<Self, GeoError> {
        if config.api_key.trim().is_empty() {
            return Err(GeoError::MissingApiKey);
        }

        let address_endpoint = parse_endpoint(&config.address_endpoint)?;
        let domain_endpoint = parse_endpoint(&config.domain_endpoint)?;

        let client = Client::builder()
            .user_agent(concat!("geolog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GeoError::Client)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            address_endpoint,
            domain_endpoint,
            timeouts: config.timeouts,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        })
    }

    /// Look up the country code for an identity within its timeout.
    ///
    /// The timeout also covers waiting for a free request slot.
    pub async fn lookup(&self, identity: &GeoIdentity) -> Result<String, GeoError> {
        let bound = self.timeouts.for_identity(identity);
        tokio::time::timeout(bound, self.request(identity))
            .await
            .map_err(|_| GeoError::Timeout(bound))?
    }

    async fn request(&self, identity: &GeoIdentity) -> Result<String, GeoError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GeoError::LimiterClosed)?;

        let url = match identity {
            GeoIdentity::Address(ip) => {
                let mut url = self.address_endpoint.clone();
                url.query_pairs_mut()
                    .append_pair("key", &self.api_key)
                    .append_pair("ip", &ip.to_string())
                    .append_pair("format", "json");
                url
            }
            GeoIdentity::Domain(domain) => {
                let mut url = self.domain_endpoint.clone();
                url.query_pairs_mut()
                    .append_pair("key", &self.api_key)
                    .append_pair("domain", domain);
                url
            }
        };

        let response = self.client.get(url).send().await.map_err(GeoError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status));
        }

        let body = response.bytes().await.map_err(GeoError::Request)?;
        let decoded: CountryBody = serde_json::from_slice(&body)?;
        let code = decoded.country_code.trim();
        if code.is_empty() {
            return Err(GeoError::EmptyCountryCode);
        }

        Ok(code.to_string())
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, GeoError> {
    Url::parse(endpoint).map_err(|_| GeoError::InvalidEndpoint(endpoint.to_string()))
}

#[async_trait]
impl CountryLookup for GeolocationClient {
    async fn country_code_for(&self, identity: &GeoIdentity) -> Option<String> {
        match self.lookup(identity).await {
            Ok(code) => Some(code),
            Err(e) => {
                debug!(%identity, error = %e, "geolocation lookup failed");
                None
            }
        }
    }
}
