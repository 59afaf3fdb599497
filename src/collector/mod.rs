//! Event collection for the evtrack pipeline.
//!
//! The host raises raw interaction events; an [`EventSource`] delivers the
//! subscribed categories to the pipeline over a channel.

pub mod channel;
pub mod replay;
pub mod types;

use crate::config::SourceConfig;
use crossbeam_channel::Receiver;

// Re-export commonly used types
pub use channel::{ChannelSource, EventEmitter};
pub use replay::ReplaySource;
pub use types::{
    EventCategory, EventKind, RawEvent, RawTouchEvent, SourceEvent, TargetNode, TouchPoint,
};

/// Capacity of source channels.
pub const CHANNEL_CAPACITY: usize = 10_000;

/// A host mechanism that raises interaction events.
pub trait EventSource {
    /// Register for the enabled categories and return the delivery channel.
    ///
    /// A source can be subscribed once. `Teardown` is always delivered.
    fn subscribe(&mut self, sources: &SourceConfig) -> Result<Receiver<SourceEvent>, CollectorError>;
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadySubscribed,
    NothingSubscribed,
    Io(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadySubscribed => write!(f, "Event source is already subscribed"),
            CollectorError::NothingSubscribed => {
                write!(f, "At least one event category must be enabled")
            }
            CollectorError::Io(e) => write!(f, "Event source IO error: {e}"),
        }
    }
}

impl std::error::Error for CollectorError {}

/// Bitmask of enabled categories.
pub(crate) fn category_mask(sources: &SourceConfig) -> u8 {
    sources
        .categories()
        .into_iter()
        .fold(0, |mask, category| mask | category.bit())
}

/// Whether an event passes a subscription mask.
pub(crate) fn passes(mask: u8, event: &SourceEvent) -> bool {
    event
        .category()
        .map_or(true, |category| mask & category.bit() != 0)
}
