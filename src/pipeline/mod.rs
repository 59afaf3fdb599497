//! Pipeline coordinator.
//!
//! Wires capture → sampling → buffer, and the scheduler/teardown triggers →
//! session manager → transport. All state is mutated on the thread that owns
//! the [`Pipeline`]; transport completions only post into its inbox.

pub mod tracker;

use crate::collector::{EventKind, RawEvent, RawTouchEvent};
use crate::config::Config;
use crate::core::{
    Clock, DeliveryScheduler, EventBuffer, EventRecord, FlushCoordinator, InitOutcome, Payload,
    SamplingFilter, SessionManager, SessionState, Trigger,
};
use crate::host::{clamp_coordinate, Host};
use crate::stats::{PipelineStats, SharedStats};
use crate::transport::{Completion, Delivery, DeliveryMode, Transport, TransportError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

pub use tracker::{StopReason, Tracker, TrackerError};

/// Result of an init request, posted back to the pipeline.
type InitReply = Result<String, TransportError>;

/// Cursor id used for non-touch input.
pub const NO_CURSOR: u32 = 0;

/// The per-visit pipeline state and its operations.
pub struct Pipeline {
    config: Config,
    host: Host,
    transport: Arc<dyn Transport>,
    filter: SamplingFilter,
    clock: Clock,
    buffer: EventBuffer,
    session: SessionManager,
    scheduler: DeliveryScheduler,
    flush: FlushCoordinator,
    stats: SharedStats,
    inbox_tx: Sender<InitReply>,
    inbox_rx: Receiver<InitReply>,
}

impl Pipeline {
    /// Start a pipeline for one page visit.
    ///
    /// Arms the deferred first send one interval after `now` and the
    /// teardown flush. `config` is used as-is; build it with
    /// [`Config::merged`] to apply start-time overrides.
    pub fn start(config: Config, host: Host, transport: Arc<dyn Transport>, now: Instant) -> Self {
        let filter = SamplingFilter::new(config.sampling_freq, config.sampling_mode);
        let buffer = EventBuffer::with_capacity_limit(config.max_buffer_records);
        let mut scheduler = DeliveryScheduler::new(config.post_interval);
        scheduler.arm_deferred(now);
        let mut flush = FlushCoordinator::new();
        flush.arm();
        let (inbox_tx, inbox_rx) = unbounded();
        let stats: SharedStats = Arc::new(PipelineStats::new());

        info!(
            visit = %stats.visit_id(),
            interval_secs = config.post_interval.as_secs_f64(),
            min_gap_ms = ?filter.min_gap_ms(),
            task = %config.task_name,
            "pipeline started"
        );

        Self {
            config,
            host,
            transport,
            filter,
            clock: Clock::new(),
            buffer,
            session: SessionManager::new(),
            scheduler,
            flush,
            stats,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stats(&self) -> SharedStats {
        Arc::clone(&self.stats)
    }

    /// Whether the teardown flush has run.
    pub fn is_torn_down(&self) -> bool {
        self.flush.has_fired()
    }

    /// Earliest instant at which [`Pipeline::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Process one pointer, key or window event. Returns `true` if recorded.
    pub fn on_raw_event(&mut self, kind: EventKind, event: &RawEvent) -> bool {
        self.record(NO_CURSOR, kind, event)
    }

    /// Process a touch event, one contact point at a time in order.
    /// Returns the number of points recorded.
    pub fn on_raw_touch_event(&mut self, kind: EventKind, event: &RawTouchEvent) -> usize {
        let mut recorded = 0;
        for point in &event.touches {
            if self.record(point.identifier, kind, &event.point_event(point)) {
                recorded += 1;
            }
        }
        recorded
    }

    fn record(&mut self, cursor_id: u32, kind: EventKind, event: &RawEvent) -> bool {
        if self.flush.has_fired() {
            return false;
        }
        self.stats.record_event_seen();

        let now_ms = event.timestamp_ms;
        if !self.filter.should_record(now_ms, self.clock.last_accepted()) {
            self.stats.record_event_sampled_out();
            trace!(%kind, ts = now_ms, "sampled out");
            return false;
        }
        self.clock.accept(now_ms);

        let (x, y) = self
            .host
            .coordinates
            .resolve(event)
            .map(|(x, y)| (clamp_coordinate(x), clamp_coordinate(y)))
            .unwrap_or((0, 0));
        let target = self.host.locator.locate(&event.target);
        let record = EventRecord::new(cursor_id, now_ms, x, y, kind, target);
        trace!(row = %record, "recorded");

        if self.buffer.append(record).is_some() {
            self.stats.record_event_evicted();
        }
        self.stats.record_event_recorded();
        true
    }

    /// Apply pending responses and run whichever timer is due.
    pub fn tick(&mut self, now: Instant) {
        self.apply_replies(now);
        if self.flush.has_fired() {
            return;
        }

        match self.scheduler.poll(now) {
            Some(Trigger::Deferred) => {
                debug!("deferred send due");
                self.dispatch();
            }
            Some(Trigger::Recurring) => self.dispatch(),
            None => {}
        }

        // In-process transports complete inline.
        self.apply_replies(now);
    }

    /// Fire the teardown flush: drain and send once, synchronously.
    ///
    /// Returns `false` if the flush already ran. No sends happen afterwards.
    pub fn teardown(&mut self) -> bool {
        if !self.flush.fire() {
            return false;
        }
        self.scheduler.disarm();

        let records = self.buffer.drain();
        let payload = self
            .session
            .next_payload(&records, self.host.metrics.as_ref(), &self.config);
        info!(
            action = payload.action(),
            records = records.len(),
            "teardown flush"
        );
        self.stats
            .record_batch_sent(payload.record_count(), payload.is_init());

        match self.transport.send(&payload, DeliveryMode::Sync) {
            Ok(Delivery::Completed(body)) => {
                if payload.is_init() {
                    self.session.on_init_response(&body);
                }
            }
            Ok(Delivery::Dispatched) => {}
            Err(e) => {
                self.stats.record_batch_failed();
                if payload.is_init() {
                    self.session.on_init_failed();
                }
                warn!("teardown flush failed: {e}");
            }
        }
        true
    }

    /// Drain the buffer into the payload the session state calls for and
    /// hand it to the transport asynchronously.
    fn dispatch(&mut self) {
        let records = self.buffer.drain();
        let payload = self
            .session
            .next_payload(&records, self.host.metrics.as_ref(), &self.config);
        debug!(action = payload.action(), records = records.len(), "sending batch");
        self.stats
            .record_batch_sent(payload.record_count(), payload.is_init());

        let completion: Completion = match payload {
            Payload::Init(_) => {
                let inbox = self.inbox_tx.clone();
                Box::new(move |reply: InitReply| {
                    let _ = inbox.send(reply);
                })
            }
            Payload::Append(_) => {
                let stats = Arc::clone(&self.stats);
                Box::new(move |reply: InitReply| {
                    if let Err(e) = reply {
                        stats.record_batch_failed();
                        warn!("append dropped: {e}");
                    }
                })
            }
        };

        if let Err(e) = self
            .transport
            .send(&payload, DeliveryMode::Async(Some(completion)))
        {
            warn!(action = payload.action(), "send failed: {e}");
            if payload.is_init() {
                // Counted when the reply is applied.
                let _ = self.inbox_tx.send(Err(e));
            } else {
                self.stats.record_batch_failed();
            }
        }
    }

    /// Apply init responses posted by transport completions.
    fn apply_replies(&mut self, now: Instant) {
        while let Ok(reply) = self.inbox_rx.try_recv() {
            self.handle_init_reply(reply, now);
        }
    }

    fn handle_init_reply(&mut self, reply: InitReply, now: Instant) {
        let outcome = match reply {
            Ok(body) => self.session.on_init_response(&body),
            Err(e) => {
                warn!("init request failed: {e}");
                self.stats.record_batch_failed();
                self.session.on_init_failed();
                InitOutcome::Rejected
            }
        };

        if self.flush.has_fired() {
            return;
        }
        match outcome {
            InitOutcome::Established(_) => self.scheduler.start_recurring(now),
            InitOutcome::Rejected => self.scheduler.arm_deferred(now),
            InitOutcome::AlreadyEstablished(_) => {}
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("session", &self.session.state())
            .field("buffered", &self.buffer.len())
            .field("deferred_armed", &self.scheduler.is_deferred_armed())
            .field("recurring", &self.scheduler.is_recurring())
            .field("flush", &self.flush)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{TargetNode, TouchPoint};
    use crate::core::SessionId;
    use crate::host::{CoordinateResolver, PageMetrics, StaticMetrics, TargetLocator};
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn pipeline(sampling_freq: f64, transport: Arc<MemoryTransport>) -> (Pipeline, Instant) {
        let config = Config {
            sampling_freq,
            post_interval: Duration::from_secs(30),
            ..Config::default()
        };
        let host = Host::new(StaticMetrics(PageMetrics {
            url: "https://example.org/form".to_string(),
            ..PageMetrics::default()
        }));
        let now = Instant::now();
        (Pipeline::start(config, host, transport, now), now)
    }

    #[test]
    fn test_events_are_buffered_without_sending() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut pipeline, _) = pipeline(0.0, transport.clone());

        for t in [0, 5, 10] {
            assert!(pipeline.on_raw_event(EventKind::MouseMove, &RawEvent::at_position(t, 1.0, 2.0)));
        }
        assert_eq!(pipeline.buffer().len(), 3);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_negative_coordinates_clamped() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut pipeline, _) = pipeline(0.0, transport);

        pipeline.on_raw_event(EventKind::Click, &RawEvent::at_position(1, -5.0, 7.4));
        pipeline.on_raw_event(EventKind::KeyDown, &RawEvent::at(2));

        let rows: Vec<String> = pipeline.buffer().iter().map(ToString::to_string).collect();
        assert_eq!(rows, vec!["0 1 0 7 click window", "0 2 0 0 keydown window"]);
    }

    #[test]
    fn test_touch_points_use_their_identifiers() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut pipeline, _) = pipeline(0.0, transport);

        let touch = RawTouchEvent {
            timestamp_ms: 3,
            touches: vec![TouchPoint::new(4, 1.0, 1.0), TouchPoint::new(9, 2.0, 2.0)],
            target: Vec::new(),
        };
        assert_eq!(pipeline.on_raw_touch_event(EventKind::TouchStart, &touch), 2);
        let cursors: Vec<u32> = pipeline.buffer().iter().map(EventRecord::cursor_id).collect();
        assert_eq!(cursors, vec![4, 9]);
    }

    #[test]
    fn test_transport_failure_retries_init_next_interval() {
        let transport = Arc::new(MemoryTransport::new());
        transport.push_init_response(Err(TransportError::Network("offline".to_string())));
        let (mut pipeline, start) = pipeline(0.0, transport.clone());
        let interval = Duration::from_secs(30);

        pipeline.tick(start + interval);
        assert_eq!(pipeline.session_state(), SessionState::Unestablished);
        assert_eq!(pipeline.next_deadline(), Some(start + interval * 2));
        assert_eq!(pipeline.stats().snapshot().batches_failed, 1);

        transport.push_init_response(Ok("8".to_string()));
        pipeline.tick(start + interval * 2);
        assert_eq!(
            pipeline.session_state(),
            SessionState::Established(SessionId::new(8).unwrap())
        );
    }

    #[test]
    fn test_empty_recurring_tick_still_appends() {
        let transport = Arc::new(MemoryTransport::with_init_responses(["3"]));
        let (mut pipeline, start) = pipeline(0.0, transport.clone());
        let interval = Duration::from_secs(30);

        pipeline.tick(start + interval);
        assert_eq!(transport.request_count(), 1);
        pipeline.tick(start + interval * 2);
        pipeline.tick(start + interval * 3);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests[1..] {
            assert_eq!(request.payload.action(), "append");
            assert_eq!(request.payload.record_count(), 0);
            assert_eq!(request.payload.info(), "");
        }
    }

    struct LabelLocator;

    impl TargetLocator for LabelLocator {
        fn locate(&self, target: &[TargetNode]) -> String {
            target
                .last()
                .map(|node| format!("{} label", node.tag))
                .unwrap_or_default()
        }
    }

    struct FixedPoint(f64, f64);

    impl CoordinateResolver for FixedPoint {
        fn resolve(&self, _event: &RawEvent) -> Option<(f64, f64)> {
            Some((self.0, self.1))
        }
    }

    #[test]
    fn test_custom_host_capabilities() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::default()
            .with_locator(LabelLocator)
            .with_coordinates(FixedPoint(12.6, 3.0));
        let mut pipeline = Pipeline::start(Config::default(), host, transport, Instant::now());

        let event = RawEvent::at(4).with_target(vec![TargetNode::new("button", 1)]);
        assert!(pipeline.on_raw_event(EventKind::Click, &event));

        let rows: Vec<String> = pipeline.buffer().iter().map(ToString::to_string).collect();
        assert_eq!(rows, vec!["0 4 13 3 click button%20label"]);
    }

    #[test]
    fn test_unrepresentable_interval_does_not_panic() {
        let transport = Arc::new(MemoryTransport::new());
        let config = Config {
            post_interval: Duration::MAX,
            ..Config::default()
        };
        let start = Instant::now();
        let mut pipeline = Pipeline::start(config, Host::default(), transport.clone(), start);

        assert_eq!(pipeline.next_deadline(), None);
        pipeline.tick(start + Duration::from_secs(3600));
        assert_eq!(transport.request_count(), 0);
        assert!(pipeline.teardown());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_teardown_is_single_fire() {
        let transport = Arc::new(MemoryTransport::new());
        let (mut pipeline, start) = pipeline(0.0, transport.clone());

        assert!(pipeline.teardown());
        assert!(!pipeline.teardown());
        assert!(!pipeline.on_raw_event(EventKind::Click, &RawEvent::at(1)));
        pipeline.tick(start + Duration::from_secs(300));
        assert_eq!(transport.request_count(), 1);
        assert!(transport.requests()[0].synchronous);
    }
}
