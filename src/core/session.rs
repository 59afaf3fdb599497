//! Session identity and payload shape selection.
//!
//! A visit starts `Unestablished`. Sending an init request moves it to
//! `Pending`; a non-zero id in the response establishes it for good. A zero
//! or unparseable response drops back to `Unestablished` so the next send is
//! another init.

use crate::config::{Config, LayoutType};
use crate::core::buffer::{serialize_info, EventRecord};
use crate::host::{MetricsProvider, PageMetrics};
use std::num::NonZeroU64;
use tracing::{debug, info, warn};

/// Server-assigned session identifier. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(NonZeroU64);

impl SessionId {
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Parse an init response body. Zero, negative or non-numeric yields `None`.
    pub fn parse(body: &str) -> Option<Self> {
        body.trim().parse::<u64>().ok().and_then(Self::new)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of the visit's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unestablished,
    Pending,
    Established(SessionId),
}

/// Request that opens a session.
#[derive(Debug, Clone, PartialEq)]
pub struct InitPayload {
    pub metrics: PageMetrics,
    pub info: String,
    pub record_count: usize,
    pub task: String,
    pub layout: LayoutType,
}

/// Request that adds records to an established session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendPayload {
    pub session_id: SessionId,
    pub info: String,
    pub record_count: usize,
}

/// One outbound batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Init(InitPayload),
    Append(AppendPayload),
}

impl Payload {
    /// Value of the `action` field.
    pub fn action(&self) -> &'static str {
        match self {
            Payload::Init(_) => "init",
            Payload::Append(_) => "append",
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            Payload::Init(p) => p.record_count,
            Payload::Append(p) => p.record_count,
        }
    }

    pub fn info(&self) -> &str {
        match self {
            Payload::Init(p) => &p.info,
            Payload::Append(p) => &p.info,
        }
    }

    pub fn is_init(&self) -> bool {
        matches!(self, Payload::Init(_))
    }
}

/// Result of applying an init response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The session was established with this id
    Established(SessionId),
    /// The session was already established; the response was ignored
    AlreadyEstablished(SessionId),
    /// No usable id; the next send retries init
    Rejected,
}

/// Owns the session state machine.
#[derive(Debug)]
pub struct SessionManager {
    state: SessionState,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unestablished,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self.state {
            SessionState::Established(id) => Some(id),
            _ => None,
        }
    }

    /// Build an init request from a drained batch.
    pub fn build_init_payload(
        records: &[EventRecord],
        metrics: PageMetrics,
        config: &Config,
    ) -> Payload {
        Payload::Init(InitPayload {
            metrics,
            info: serialize_info(records),
            record_count: records.len(),
            task: config.task_name.clone(),
            layout: config.layout_type,
        })
    }

    /// Build an append request for an established session.
    pub fn build_append_payload(session_id: SessionId, records: &[EventRecord]) -> Payload {
        Payload::Append(AppendPayload {
            session_id,
            info: serialize_info(records),
            record_count: records.len(),
        })
    }

    /// Build the payload the current state calls for.
    ///
    /// `Unestablished` and `Pending` produce an init request (and mark the
    /// session `Pending`); `Established` produces an append. Metrics are only
    /// read for init requests.
    pub fn next_payload(
        &mut self,
        records: &[EventRecord],
        metrics: &dyn MetricsProvider,
        config: &Config,
    ) -> Payload {
        match self.state {
            SessionState::Established(id) => Self::build_append_payload(id, records),
            SessionState::Unestablished | SessionState::Pending => {
                self.state = SessionState::Pending;
                Self::build_init_payload(records, metrics.metrics(), config)
            }
        }
    }

    /// Apply the body of an init response.
    pub fn on_init_response(&mut self, body: &str) -> InitOutcome {
        if let SessionState::Established(id) = self.state {
            debug!(session = %id, "ignoring init response for established session");
            return InitOutcome::AlreadyEstablished(id);
        }

        match SessionId::parse(body) {
            Some(id) => {
                self.state = SessionState::Established(id);
                info!(session = %id, "session established");
                InitOutcome::Established(id)
            }
            None => {
                self.state = SessionState::Unestablished;
                warn!(response = %body.trim(), "init response carried no session id");
                InitOutcome::Rejected
            }
        }
    }

    /// The init request failed in transport.
    pub fn on_init_failed(&mut self) {
        if self.state == SessionState::Pending {
            self.state = SessionState::Unestablished;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::EventKind;
    use crate::host::StaticMetrics;

    fn metrics() -> StaticMetrics {
        StaticMetrics(PageMetrics {
            url: "https://shop.example/cart".to_string(),
            screen_width: 1920,
            screen_height: 1080,
            ..PageMetrics::default()
        })
    }

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord::new(0, 1, 2, 3, EventKind::MouseMove, "/html/body"),
            EventRecord::new(0, 4, 5, 6, EventKind::Click, "/html/body/a"),
        ]
    }

    #[test]
    fn test_session_id_parsing() {
        assert_eq!(SessionId::parse("42").map(SessionId::get), Some(42));
        assert_eq!(SessionId::parse(" 7\n").map(SessionId::get), Some(7));
        assert!(SessionId::parse("0").is_none());
        assert!(SessionId::parse("-3").is_none());
        assert!(SessionId::parse("error").is_none());
        assert!(SessionId::parse("").is_none());
    }

    #[test]
    fn test_unestablished_sends_init_and_becomes_pending() {
        let mut manager = SessionManager::new();
        let payload = manager.next_payload(&records(), &metrics(), &Config::default());

        match payload {
            Payload::Init(init) => {
                assert_eq!(init.metrics.url, "https://shop.example/cart");
                assert_eq!(init.task, "evtrack");
                assert_eq!(init.layout, LayoutType::Liquid);
                assert_eq!(init.record_count, 2);
                assert!(init.info.contains("click"));
            }
            other => panic!("expected init, got {other:?}"),
        }
        assert_eq!(manager.state(), SessionState::Pending);

        // Pending still selects init.
        assert!(manager
            .next_payload(&[], &metrics(), &Config::default())
            .is_init());
    }

    #[test]
    fn test_zero_response_stays_unestablished() {
        let mut manager = SessionManager::new();
        manager.next_payload(&[], &metrics(), &Config::default());
        assert_eq!(manager.on_init_response("0"), InitOutcome::Rejected);
        assert_eq!(manager.state(), SessionState::Unestablished);
    }

    #[test]
    fn test_established_sends_append_and_id_is_stable() {
        let mut manager = SessionManager::new();
        manager.next_payload(&[], &metrics(), &Config::default());
        let id = SessionId::new(42).unwrap();
        assert_eq!(manager.on_init_response("42"), InitOutcome::Established(id));

        let payload = manager.next_payload(&records(), &metrics(), &Config::default());
        match payload {
            Payload::Append(append) => {
                assert_eq!(append.session_id, id);
                assert_eq!(append.record_count, 2);
            }
            other => panic!("expected append, got {other:?}"),
        }

        // A later response never replaces the id.
        assert_eq!(
            manager.on_init_response("99"),
            InitOutcome::AlreadyEstablished(id)
        );
        assert_eq!(manager.session_id(), Some(id));
    }

    #[test]
    fn test_transport_failure_returns_to_unestablished() {
        let mut manager = SessionManager::new();
        manager.next_payload(&[], &metrics(), &Config::default());
        manager.on_init_failed();
        assert_eq!(manager.state(), SessionState::Unestablished);
    }
}
