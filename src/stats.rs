//! Counters describing what the pipeline did during the current visit.
//!
//! Nothing here is persisted; the counters live as long as the visit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline statistics for one page visit.
///
/// Counters are atomic so that transport completions running on other
/// threads can report without touching pipeline state.
#[derive(Debug)]
pub struct PipelineStats {
    /// Raw events offered to the pipeline (touch points counted individually)
    events_seen: AtomicU64,
    /// Events that passed sampling and were buffered
    events_recorded: AtomicU64,
    /// Events dropped by the sampling filter
    events_sampled_out: AtomicU64,
    /// Records evicted by the buffer cap
    events_evicted: AtomicU64,
    /// Requests handed to the transport
    batches_sent: AtomicU64,
    /// Requests that failed in transport
    batches_failed: AtomicU64,
    /// Records carried by sent requests
    records_sent: AtomicU64,
    /// Init requests sent
    init_attempts: AtomicU64,
    visit_id: Uuid,
    visit_start: DateTime<Utc>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            events_seen: AtomicU64::new(0),
            events_recorded: AtomicU64::new(0),
            events_sampled_out: AtomicU64::new(0),
            events_evicted: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            records_sent: AtomicU64::new(0),
            init_attempts: AtomicU64::new(0),
            visit_id: Uuid::new_v4(),
            visit_start: Utc::now(),
        }
    }

    pub fn visit_id(&self) -> Uuid {
        self.visit_id
    }

    pub fn record_event_seen(&self) {
        self.events_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_recorded(&self) {
        self.events_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_sampled_out(&self) {
        self.events_sampled_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_evicted(&self) {
        self.events_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request handed to the transport.
    pub fn record_batch_sent(&self, records: usize, init: bool) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.records_sent
            .fetch_add(records as u64, Ordering::Relaxed);
        if init {
            self.init_attempts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            visit_id: self.visit_id,
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_recorded: self.events_recorded.load(Ordering::Relaxed),
            events_sampled_out: self.events_sampled_out.load(Ordering::Relaxed),
            events_evicted: self.events_evicted.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            init_attempts: self.init_attempts.load(Ordering::Relaxed),
            visit_start: self.visit_start,
            visit_duration_secs: (Utc::now() - self.visit_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Visit {}:\n\
             - Events seen: {}\n\
             - Events recorded: {}\n\
             - Events dropped by sampling: {}\n\
             - Events evicted by buffer cap: {}\n\
             - Requests sent: {} ({} init)\n\
             - Requests failed: {}\n\
             - Records sent: {}\n\
             - Visit duration: {} seconds",
            stats.visit_id,
            stats.events_seen,
            stats.events_recorded,
            stats.events_sampled_out,
            stats.events_evicted,
            stats.batches_sent,
            stats.init_attempts,
            stats.batches_failed,
            stats.records_sent,
            stats.visit_duration_secs
        )
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pipeline statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub visit_id: Uuid,
    pub events_seen: u64,
    pub events_recorded: u64,
    pub events_sampled_out: u64,
    pub events_evicted: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub records_sent: u64,
    pub init_attempts: u64,
    pub visit_start: DateTime<Utc>,
    pub visit_duration_secs: u64,
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<PipelineStats>;
