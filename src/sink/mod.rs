//! Downstream record consumers
//!
//! Persistence lives outside this crate. A [`RecordSink`] receives records
//! in fixed-size batches pulled from the pipeline's lazy stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::models::EnrichedRecord;
use crate::pipeline::PipelineError;

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write one batch of records.
    async fn write_batch(&self, records: &[EnrichedRecord]) -> Result<()>;
}

/// Pull every record from `records` and hand them to `sink` in batches of
/// `batch_size`, flushing the remainder at the end.
///
/// Returns the number of records written. The first pipeline or sink
/// error stops the drain.
pub async fn drain_into<S>(records: S, sink: &dyn RecordSink, batch_size: usize) -> Result<u64>
where
    S: Stream<Item = Result<EnrichedRecord, PipelineError>>,
{
    let batch_size = batch_size.max(1);
    let mut records = std::pin::pin!(records);
    let mut pending = Vec::with_capacity(batch_size);
    let mut written = 0u64;

    while let Some(record) = records.next().await {
        pending.push(record?);
        if pending.len() >= batch_size {
            sink.write_batch(&pending).await?;
            written += pending.len() as u64;
            pending.clear();
        }
    }

    if !pending.is_empty() {
        sink.write_batch(&pending).await?;
        written += pending.len() as u64;
    }

    Ok(written)
}

/// Writes each record as one JSON object per line.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> RecordSink for JsonLinesSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn write_batch(&self, records: &[EnrichedRecord]) -> Result<()> {
        let mut buf = Vec::with_capacity(records.len() * 192);
        for record in records {
            serde_json::to_writer(&mut buf, record).context("failed to serialize record")?;
            buf.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buf)
            .await
            .context("failed to write records")?;
        writer.flush().await.context("failed to flush records")?;
        Ok(())
    }
}
