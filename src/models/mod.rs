mod record;

pub use record::{EnrichedRecord, ParsedRequest, UNKNOWN};
