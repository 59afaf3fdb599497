//! Delivery of payloads to the remote collector.
//!
//! The pipeline hands a [`Payload`] and a [`DeliveryMode`] to a
//! [`Transport`]. Synchronous sends block until the collector answers and
//! are reserved for teardown; asynchronous sends return immediately and
//! report through an optional completion.

pub mod form;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use crate::core::Payload;

pub use form::form_fields;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use memory::{MemoryTransport, SentRequest};

/// Callback run once an asynchronous send has finished.
pub type Completion = Box<dyn FnOnce(Result<String, TransportError>) + Send + 'static>;

/// How a payload is delivered.
pub enum DeliveryMode {
    /// Block until the collector answers
    Sync,
    /// Dispatch and return; the completion (if any) receives the response body
    Async(Option<Completion>),
}

impl DeliveryMode {
    pub fn is_sync(&self) -> bool {
        matches!(self, DeliveryMode::Sync)
    }
}

impl std::fmt::Debug for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Sync => f.write_str("Sync"),
            DeliveryMode::Async(done) => f
                .debug_tuple("Async")
                .field(&done.as_ref().map(|_| "completion"))
                .finish(),
        }
    }
}

/// What a transport did with a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A synchronous send finished with this response body
    Completed(String),
    /// An asynchronous send was handed off
    Dispatched,
}

/// Sends payloads to the collector.
pub trait Transport: Send + Sync {
    fn send(&self, payload: &Payload, mode: DeliveryMode) -> Result<Delivery, TransportError>;
}

/// Transport error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error, including timeouts
    Network(String),
    /// Collector returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Config(msg) => write!(f, "Transport config error: {msg}"),
            TransportError::Network(msg) => write!(f, "Transport network error: {msg}"),
            TransportError::Server { status, message } => {
                write!(f, "Collector error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for TransportError {}
