//! Event loop driving a [`Pipeline`] from an [`EventSource`].

use super::Pipeline;
use crate::collector::{CollectorError, EventSource, SourceEvent};
use crate::config::{Config, ConfigError, ConfigOverrides};
use crate::host::Host;
use crate::stats::SharedStats;
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest the loop waits for an event before re-checking timers and the run flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source signalled the end of the visit
    Teardown,
    /// The source went away without signalling
    Disconnected,
    /// The run flag was cleared
    Interrupted,
}

/// Errors starting a tracker.
#[derive(Debug)]
pub enum TrackerError {
    Config(ConfigError),
    Collector(CollectorError),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::Config(e) => write!(f, "{e}"),
            TrackerError::Collector(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<ConfigError> for TrackerError {
    fn from(e: ConfigError) -> Self {
        TrackerError::Config(e)
    }
}

impl From<CollectorError> for TrackerError {
    fn from(e: CollectorError) -> Self {
        TrackerError::Collector(e)
    }
}

/// Owns a pipeline and the channel its events arrive on.
///
/// Dropping a tracker fires the teardown flush if it has not run yet.
pub struct Tracker {
    pipeline: Pipeline,
    receiver: Receiver<SourceEvent>,
}

impl Tracker {
    /// Merge `overrides` over `base`, subscribe to the enabled categories
    /// and start the pipeline.
    pub fn start<S>(
        base: &Config,
        overrides: &ConfigOverrides,
        host: Host,
        transport: Arc<dyn Transport>,
        source: &mut S,
    ) -> Result<Self, TrackerError>
    where
        S: EventSource + ?Sized,
    {
        let config = base.merged(overrides)?;
        let receiver = source.subscribe(&config.sources)?;
        info!(categories = ?config.sources.categories(), "subscribed to event source");

        Ok(Self {
            pipeline: Pipeline::start(config, host, transport, Instant::now()),
            receiver,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> SharedStats {
        self.pipeline.stats()
    }

    /// Process events until teardown, disconnect or `running` is cleared,
    /// then fire the teardown flush.
    pub fn run(&mut self, running: &AtomicBool) -> StopReason {
        let reason = loop {
            if !running.load(Ordering::SeqCst) {
                break StopReason::Interrupted;
            }

            let timeout = self
                .pipeline
                .next_deadline()
                .map(|at| at.saturating_duration_since(Instant::now()).min(POLL_INTERVAL))
                .unwrap_or(POLL_INTERVAL);

            match self.receiver.recv_timeout(timeout) {
                Ok(SourceEvent::Event { kind, event }) => {
                    self.pipeline.on_raw_event(kind, &event);
                }
                Ok(SourceEvent::Touch { kind, event }) => {
                    self.pipeline.on_raw_touch_event(kind, &event);
                }
                Ok(SourceEvent::Teardown) => break StopReason::Teardown,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("event source disconnected");
                    break StopReason::Disconnected;
                }
            }

            self.pipeline.tick(Instant::now());
        };

        info!(?reason, "tracker stopping");
        self.pipeline.teardown();
        reason
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.pipeline.teardown();
    }
}
