//! Country lookup against an external geolocation service
//!
//! The service exposes one endpoint keyed by address and one keyed by
//! domain name. Every call carries its own timeout and any failure
//! degrades to "no country" instead of an error.

mod client;

pub use client::{GeoError, GeoTimeouts, GeolocationClient};

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// What to geolocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoIdentity {
    Address(IpAddr),
    Domain(String),
}

impl GeoIdentity {
    /// Classify a token as a literal address or a domain name.
    pub fn parse(identity: &str) -> Self {
        match identity.parse::<IpAddr>() {
            Ok(ip) => GeoIdentity::Address(ip),
            Err(_) => GeoIdentity::Domain(identity.to_string()),
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self, GeoIdentity::Address(_))
    }
}

impl fmt::Display for GeoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoIdentity::Address(ip) => write!(f, "{ip}"),
            GeoIdentity::Domain(domain) => f.write_str(domain),
        }
    }
}

impl From<IpAddr> for GeoIdentity {
    fn from(ip: IpAddr) -> Self {
        GeoIdentity::Address(ip)
    }
}

/// Maps an identity to a country code.
#[async_trait]
pub trait CountryLookup: Send + Sync {
    /// `None` when the country could not be determined for any reason.
    async fn country_code_for(&self, identity: &GeoIdentity) -> Option<String>;
}
