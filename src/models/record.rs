use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Sentinel for a country code (or address) that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// A GET request extracted from one access-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRequest {
    /// Hostname or literal address of the requester, as logged
    pub client: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Request path with any query string removed
    pub request_uri: String,
    pub protocol_version: String,
    pub status_code: u32,
    pub response_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub client: String,
    pub timestamp: DateTime<FixedOffset>,
    pub request_uri: String,
    pub protocol_version: String,
    pub status_code: u32,
    pub response_size: u64,
    pub country_code: String,
    pub is_fallback_resolution: bool,
}

impl EnrichedRecord {
    pub fn new(request: ParsedRequest, country_code: String, is_fallback_resolution: bool) -> Self {
        Self {
            client: request.client,
            timestamp: request.timestamp,
            request_uri: request.request_uri,
            protocol_version: request.protocol_version,
            status_code: request.status_code,
            response_size: request.response_size,
            country_code,
            is_fallback_resolution,
        }
    }

    /// True when geolocation produced a usable country code.
    pub fn is_located(&self) -> bool {
        self.country_code != UNKNOWN
    }
}
