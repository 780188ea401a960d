//! Batch enrichment scheduler
//!
//! Lines are grouped into fixed-size batches. Each batch is enriched with
//! one task per line, joined, put back into input order and filtered
//! before the next batch starts filling. Nothing runs across batches.

mod enrich;
pub mod source;
mod stats;

pub use enrich::{Enricher, LineOutcome};
pub use source::LineStream;
pub use stats::{PipelineStats, StatsSnapshot};

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::{Config, PipelineConfig};
use crate::geo::{CountryLookup, GeoError, GeolocationClient};
use crate::models::EnrichedRecord;
use crate::resolver::{ResolutionCache, SystemResolver};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read log input: {0}")]
    Read(#[from] io::Error),
}

pub type RecordStream = Pin<Box<dyn Stream<Item = Result<EnrichedRecord, PipelineError>> + Send>>;

pub struct Pipeline {
    enricher: Arc<Enricher>,
    batch_size: usize,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(enricher: Enricher, config: &PipelineConfig) -> Self {
        Self {
            enricher: Arc::new(enricher),
            batch_size: config.batch_size.max(1),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Production wiring: system DNS plus the HTTP geolocation client.
    ///
    /// Fails when the API key is missing, before any input is read.
    pub fn from_config(config: &Config) -> Result<Self, GeoError> {
        let geo: Arc<dyn CountryLookup> = Arc::new(GeolocationClient::from_config(&config.geo)?);
        let cache = Arc::new(ResolutionCache::new(Arc::new(SystemResolver)));
        Ok(Self::new(Enricher::new(cache, geo), &config.pipeline))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        self.enricher.cache()
    }

    /// Enrich one batch concurrently; outcomes come back in input order.
    pub async fn flush(&self, batch: Vec<String>) -> Vec<LineOutcome> {
        flush_batch(&self.enricher, &self.stats, batch).await
    }

    /// Turn a line stream into a lazy stream of located records.
    ///
    /// A read error from `lines` is yielded once and ends the stream; the
    /// partially filled batch is discarded.
    pub fn run<S>(&self, lines: S) -> RecordStream
    where
        S: Stream<Item = io::Result<String>> + Send + 'static,
    {
        let enricher = Arc::clone(&self.enricher);
        let stats = Arc::clone(&self.stats);
        let batch_size = self.batch_size;

        Box::pin(stream! {
            let mut lines = Box::pin(lines);
            'batches: loop {
                let mut batch = Vec::with_capacity(batch_size);
                let mut exhausted = false;

                while batch.len() < batch_size {
                    match lines.next().await {
                        Some(Ok(line)) => batch.push(line),
                        Some(Err(e)) => {
                            yield Err(PipelineError::Read(e));
                            break 'batches;
                        }
                        None => {
                            exhausted = true;
                            break;
                        }
                    }
                }

                if !batch.is_empty() {
                    for outcome in flush_batch(&enricher, &stats, batch).await {
                        if let Some(record) = outcome.into_record() {
                            yield Ok(record);
                        }
                    }
                }

                if exhausted {
                    break;
                }
            }
        })
    }

    /// Open a gzip access log and stream its located records.
    pub async fn process_file(&self, path: impl AsRef<Path>) -> Result<RecordStream, PipelineError> {
        let lines = source::open(path).await?;
        Ok(self.run(lines))
    }
}

async fn flush_batch(
    enricher: &Arc<Enricher>,
    stats: &PipelineStats,
    batch: Vec<String>,
) -> Vec<LineOutcome> {
    let len = batch.len();
    stats.record_batch(len);

    let mut tasks = JoinSet::new();
    let mut positions = HashMap::with_capacity(len);
    for (index, line) in batch.into_iter().enumerate() {
        let enricher = Arc::clone(enricher);
        let handle = tasks.spawn(async move { (index, enricher.enrich(&line).await) });
        positions.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<LineOutcome>> = std::iter::repeat_with(|| None).take(len).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => slots[index] = Some(outcome),
            Err(e) => {
                let index = positions.get(&e.id()).copied();
                warn!(?index, error = %e, "enrichment task did not complete, dropping line");
            }
        }
    }

    let outcomes: Vec<LineOutcome> = slots
        .into_iter()
        .map(|slot| slot.unwrap_or(LineOutcome::Failed))
        .collect();
    for outcome in &outcomes {
        stats.record_outcome(outcome);
    }
    debug!(lines = len, "batch enriched");

    outcomes
}
