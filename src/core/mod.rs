//! Core functionality of the evtrack pipeline.
//!
//! This module contains:
//! - Sampling of incoming events
//! - The ordered record buffer and its row serialization
//! - Session state and payload selection
//! - Send scheduling and the teardown flush hook

pub mod buffer;
pub mod flush;
pub mod sampling;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use buffer::{escape_target, serialize_info, EventBuffer, EventRecord, INFO_SEPARATOR};
pub use flush::FlushCoordinator;
pub use sampling::{Clock, SamplingFilter, SamplingMode};
pub use scheduler::{DeliveryScheduler, Trigger};
pub use session::{
    AppendPayload, InitOutcome, InitPayload, Payload, SessionId, SessionManager, SessionState,
};
