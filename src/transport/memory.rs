//! In-process transport that records requests and answers from a script.
//!
//! Used for dry runs and for exercising the pipeline without a collector.

use super::{Completion, Delivery, DeliveryMode, Transport, TransportError};
use crate::core::Payload;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

/// A request seen by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub payload: Payload,
    pub synchronous: bool,
}

/// An asynchronous send whose completion has not run yet.
struct HeldCompletion {
    done: Completion,
    response: Result<String, TransportError>,
}

#[derive(Default)]
struct MemoryState {
    requests: Vec<SentRequest>,
    init_responses: VecDeque<Result<String, TransportError>>,
    held: VecDeque<HeldCompletion>,
}

/// Records every send. Init requests are answered from a queue of scripted
/// responses (then `"0"` once the queue is empty); appends answer `""`.
///
/// Completions run inline on the sending thread, unless the transport was
/// built with [`MemoryTransport::holding_completions`]. Then they wait in
/// order until [`MemoryTransport::release_completions`] is called.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    log_requests: bool,
    hold_completions: bool,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryTransport")
            .field("requests", &state.requests.len())
            .field("held", &state.held.len())
            .field("log_requests", &self.log_requests)
            .finish()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the given init response bodies, in order.
    pub fn with_init_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        for response in responses {
            transport.push_init_response(Ok(response.into()));
        }
        transport
    }

    /// Log each request at info level.
    pub fn logging(mut self) -> Self {
        self.log_requests = true;
        self
    }

    /// Keep asynchronous completions until they are released, so a send
    /// stays in flight.
    pub fn holding_completions(mut self) -> Self {
        self.hold_completions = true;
        self
    }

    /// Number of completions waiting to be released.
    pub fn held_count(&self) -> usize {
        self.lock().held.len()
    }

    /// Run every held completion in send order. Returns how many ran.
    pub fn release_completions(&self) -> usize {
        let held: Vec<HeldCompletion> = self.lock().held.drain(..).collect();
        let count = held.len();
        for HeldCompletion { done, response } in held {
            (done)(response);
        }
        count
    }

    /// Queue the next init response, which may be a failure.
    pub fn push_init_response(&self, response: Result<String, TransportError>) {
        self.lock().init_responses.push_back(response);
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<SentRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panicking completion cannot leave the state half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn send(&self, payload: &Payload, mode: DeliveryMode) -> Result<Delivery, TransportError> {
        if self.log_requests {
            info!(
                action = payload.action(),
                records = payload.record_count(),
                sync = mode.is_sync(),
                rows = %payload.info(),
                "request"
            );
        }

        let response = {
            let mut state = self.lock();
            state.requests.push(SentRequest {
                payload: payload.clone(),
                synchronous: mode.is_sync(),
            });
            if payload.is_init() {
                state
                    .init_responses
                    .pop_front()
                    .unwrap_or_else(|| Ok("0".to_string()))
            } else {
                Ok(String::new())
            }
        };

        match mode {
            DeliveryMode::Sync => response.map(Delivery::Completed),
            DeliveryMode::Async(Some(done)) if self.hold_completions => {
                self.lock().held.push_back(HeldCompletion { done, response });
                Ok(Delivery::Dispatched)
            }
            DeliveryMode::Async(done) => {
                if let Some(done) = done {
                    done(response);
                }
                Ok(Delivery::Dispatched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionId, SessionManager};
    use crate::host::PageMetrics;
    use std::sync::Arc;

    #[test]
    fn test_scripted_init_responses() {
        let transport = MemoryTransport::with_init_responses(["0", "42"]);
        let init = SessionManager::build_init_payload(
            &[],
            PageMetrics::default(),
            &crate::config::Config::default(),
        );

        let first = transport.send(&init, DeliveryMode::Sync).unwrap();
        let second = transport.send(&init, DeliveryMode::Sync).unwrap();
        let third = transport.send(&init, DeliveryMode::Sync).unwrap();
        assert_eq!(first, Delivery::Completed("0".to_string()));
        assert_eq!(second, Delivery::Completed("42".to_string()));
        assert_eq!(third, Delivery::Completed("0".to_string()));
        assert_eq!(transport.request_count(), 3);
    }

    #[test]
    fn test_async_completion_runs_inline() {
        let transport = MemoryTransport::new();
        let append =
            SessionManager::build_append_payload(SessionId::new(5).unwrap(), &[]);
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let delivery = transport
            .send(
                &append,
                DeliveryMode::Async(Some(Box::new(move |r: Result<String, TransportError>| {
                    *sink.lock().unwrap() = Some(r);
                }))),
            )
            .unwrap();

        assert_eq!(delivery, Delivery::Dispatched);
        assert_eq!(*seen.lock().unwrap(), Some(Ok(String::new())));
        assert!(!transport.requests()[0].synchronous);
    }

    #[test]
    fn test_held_completions_wait_for_release() {
        let transport = MemoryTransport::with_init_responses(["7"]).holding_completions();
        let init = SessionManager::build_init_payload(
            &[],
            PageMetrics::default(),
            &crate::config::Config::default(),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        transport
            .send(
                &init,
                DeliveryMode::Async(Some(Box::new(move |r: Result<String, TransportError>| {
                    sink.lock().unwrap().push(r);
                }))),
            )
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(transport.held_count(), 1);

        // Synchronous sends are never held.
        assert_eq!(
            transport.send(&init, DeliveryMode::Sync).unwrap(),
            Delivery::Completed("0".to_string())
        );

        assert_eq!(transport.release_completions(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![Ok("7".to_string())]);
        assert_eq!(transport.held_count(), 0);
    }

    #[test]
    fn test_scripted_failure() {
        let transport = MemoryTransport::new();
        transport.push_init_response(Err(TransportError::Network("offline".to_string())));
        let init = SessionManager::build_init_payload(
            &[],
            PageMetrics::default(),
            &crate::config::Config::default(),
        );
        assert!(transport.send(&init, DeliveryMode::Sync).is_err());
    }
}
