use std::sync::Arc;
use tracing::warn;

use crate::geo::{CountryLookup, GeoIdentity};
use crate::models::{EnrichedRecord, UNKNOWN};
use crate::parser::RecordMatcher;
use crate::resolver::ResolutionCache;

/// Result of enriching one raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Matched, resolved and located
    Enriched(EnrichedRecord),
    /// Matched, but the country code is [`UNKNOWN`]
    Degraded(EnrichedRecord),
    /// Not a GET request in the expected format, or an ignored asset
    Rejected,
    /// Matched but a field failed to convert, or the enrichment task died
    Failed,
}

impl LineOutcome {
    /// The record, if this outcome is emitted downstream.
    pub fn into_record(self) -> Option<EnrichedRecord> {
        match self {
            LineOutcome::Enriched(record) if record.is_located() => Some(record),
            _ => None,
        }
    }
}

/// Per-line match, resolve, geolocate workflow.
pub struct Enricher {
    matcher: RecordMatcher,
    cache: Arc<ResolutionCache>,
    geo: Arc<dyn CountryLookup>,
}

impl Enricher {
    pub fn new(cache: Arc<ResolutionCache>, geo: Arc<dyn CountryLookup>) -> Self {
        Self {
            matcher: RecordMatcher::new(),
            cache,
            geo,
        }
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub async fn enrich(&self, line: &str) -> LineOutcome {
        let request = match self.matcher.match_line(line) {
            Ok(Some(request)) => request,
            Ok(None) => return LineOutcome::Rejected,
            Err(e) => {
                warn!(error = %e, line, "dropping malformed log line");
                return LineOutcome::Failed;
            }
        };

        let resolution = self.cache.resolve(&request.client).await;

        // Unresolved clients skip geolocation entirely.
        let country = match resolution.address() {
            Some(ip) => self.geo.country_code_for(&GeoIdentity::from(ip)).await,
            None => None,
        };

        // A lookup may itself answer with the sentinel
        match country.filter(|code| code != UNKNOWN) {
            Some(code) => {
                LineOutcome::Enriched(EnrichedRecord::new(request, code, resolution.is_fallback()))
            }
            None => LineOutcome::Degraded(EnrichedRecord::new(
                request,
                UNKNOWN.to_string(),
                resolution.is_fallback(),
            )),
        }
    }
}
