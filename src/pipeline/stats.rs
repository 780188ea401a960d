use std::sync::atomic::{AtomicU64, Ordering};

use super::LineOutcome;

/// Counters for one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineStats {
    lines: AtomicU64,
    batches: AtomicU64,
    enriched: AtomicU64,
    degraded: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines: u64,
    pub batches: u64,
    pub enriched: u64,
    pub degraded: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl PipelineStats {
    pub fn record_batch(&self, lines: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.lines.fetch_add(lines as u64, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: &LineOutcome) {
        let counter = match outcome {
            LineOutcome::Enriched(_) => &self.enriched,
            LineOutcome::Degraded(_) => &self.degraded,
            LineOutcome::Rejected => &self.rejected,
            LineOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines: self.lines.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
