//! evtrack - client-side activity tracking pipeline.
//!
//! This library observes a user's interaction with a page (pointer,
//! keyboard, touch and window events), reduces the stream into a compact
//! log and delivers it to a remote collector in batches, one session per
//! visit, with a final synchronous flush when the visit ends.
//!
//! # Guarantees
//!
//! - **Ordering**: records are sent in capture order
//! - **One session per visit**: the id assigned by the collector never changes
//! - **No loss on teardown**: buffered records go out in one synchronous request
//! - **Rate limiting**: events closer than the sampling gap are dropped
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           evtrack                                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ EventSource │──▶│  Sampling   │──▶│   Buffer    │             │
//! │  │  (host)     │   │  (min gap)  │   │ (in order)  │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                                             │                    │
//! │  ┌─────────────┐   ┌─────────────┐          ▼                    │
//! │  │  Scheduler  │──▶│   Session   │──▶┌─────────────┐             │
//! │  │ (interval)  │   │ init/append │   │  Transport  │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │  ┌─────────────┐          ▲                                      │
//! │  │  Teardown   │──────────┘  (synchronous, once)                 │
//! │  └─────────────┘                                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use evtrack::{ChannelSource, Config, ConfigOverrides, Host, MemoryTransport, Tracker};
//!
//! let mut source = ChannelSource::new();
//! let emitter = source.emitter();
//! let transport = Arc::new(MemoryTransport::with_init_responses(["42"]));
//!
//! let mut tracker = Tracker::start(
//!     &Config::default(),
//!     &ConfigOverrides::default(),
//!     Host::default(),
//!     transport,
//!     &mut source,
//! )
//! .expect("Failed to start tracker");
//!
//! // The host raises events through `emitter` from its own thread.
//! emitter.teardown();
//! tracker.run(&AtomicBool::new(true));
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod host;
pub mod pipeline;
pub mod stats;
pub mod transport;

// Re-export key types at crate root for convenience
pub use collector::{
    ChannelSource, CollectorError, EventEmitter, EventKind, EventSource, RawEvent, RawTouchEvent,
    ReplaySource, SourceEvent,
};
pub use config::{Config, ConfigError, ConfigOverrides, LayoutType, SourceConfig};
pub use core::{EventRecord, Payload, SamplingMode, SessionId, SessionState};
pub use host::{Host, PageMetrics, StaticMetrics};
pub use pipeline::{Pipeline, StopReason, Tracker, TrackerError};
pub use stats::{PipelineStats, SharedStats, StatsSnapshot};
pub use transport::{DeliveryMode, MemoryTransport, Transport, TransportError};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
