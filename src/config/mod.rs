use anyhow::{bail, Context};
use std::time::Duration;

use crate::geo::GeoTimeouts;

pub const DEFAULT_ADDRESS_ENDPOINT: &str = "https://api.ip2location.io/";
pub const DEFAULT_DOMAIN_ENDPOINT: &str = "https://api.ip2whois.com/v2";

#[derive(Debug, Clone)]
pub struct Config {
    pub geo: GeoConfig,
    pub pipeline: PipelineConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub api_key: String,
    pub address_endpoint: String,
    pub domain_endpoint: String,
    pub timeouts: GeoTimeouts,
    /// Upper bound on concurrent outbound geolocation calls
    pub max_in_flight: usize,
}

impl GeoConfig {
    /// Defaults for everything except the credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            address_endpoint: DEFAULT_ADDRESS_ENDPOINT.to_string(),
            domain_endpoint: DEFAULT_DOMAIN_ENDPOINT.to_string(),
            timeouts: GeoTimeouts::default(),
            max_in_flight: PipelineConfig::default_batch_size(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lines enriched concurrently before the next batch starts filling
    pub batch_size: usize,
}

impl PipelineConfig {
    const fn default_batch_size() -> usize {
        100
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Records handed to the sink per write
    pub batch_size: usize,
}

impl SinkConfig {
    const fn default_batch_size() -> usize {
        20
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("API_KEY").context("API_KEY must be set")?;
        if api_key.trim().is_empty() {
            bail!("API_KEY must not be empty");
        }

        let mut geo = GeoConfig::new(api_key);
        if let Ok(endpoint) = std::env::var("GEO_ADDRESS_ENDPOINT") {
            geo.address_endpoint = endpoint;
        }
        if let Ok(endpoint) = std::env::var("GEO_DOMAIN_ENDPOINT") {
            geo.domain_endpoint = endpoint;
        }
        if let Some(ms) = parse_var::<u64>("GEO_ADDRESS_TIMEOUT_MS")? {
            geo.timeouts.address = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>("GEO_DOMAIN_TIMEOUT_MS")? {
            geo.timeouts.domain = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_var::<usize>("GEO_MAX_IN_FLIGHT")? {
            geo.max_in_flight = limit;
        }

        let mut pipeline = PipelineConfig::default();
        if let Some(size) = parse_var::<usize>("PIPELINE_BATCH_SIZE")? {
            pipeline.batch_size = size;
        }

        let mut sink = SinkConfig::default();
        if let Some(size) = parse_var::<usize>("SINK_BATCH_SIZE")? {
            sink.batch_size = size;
        }

        Ok(Config {
            geo,
            pipeline,
            sink,
        })
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value '{value}'")),
        Err(_) => Ok(None),
    }
}
