//! Channel-backed event source the host pushes events into.

use super::{category_mask, passes, CollectorError, EventSource, SourceEvent, CHANNEL_CAPACITY};
use crate::config::SourceConfig;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// An event source fed by the host through [`EventEmitter`] handles.
///
/// Events for categories that are not subscribed are discarded at the
/// emitter, before they reach the channel.
pub struct ChannelSource {
    sender: Sender<SourceEvent>,
    receiver: Option<Receiver<SourceEvent>>,
    mask: Arc<AtomicU8>,
}

impl ChannelSource {
    pub fn new() -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver: Some(receiver),
            mask: Arc::new(AtomicU8::new(0)),
        }
    }

    /// A handle the host uses to raise events. Can be cloned freely.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            sender: self.sender.clone(),
            mask: Arc::clone(&self.mask),
        }
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for ChannelSource {
    fn subscribe(&mut self, sources: &SourceConfig) -> Result<Receiver<SourceEvent>, CollectorError> {
        if !sources.any_enabled() {
            return Err(CollectorError::NothingSubscribed);
        }
        let receiver = self.receiver.take().ok_or(CollectorError::AlreadySubscribed)?;
        self.mask.store(category_mask(sources), Ordering::SeqCst);
        Ok(receiver)
    }
}

/// Host-side handle of a [`ChannelSource`].
#[derive(Clone)]
pub struct EventEmitter {
    sender: Sender<SourceEvent>,
    mask: Arc<AtomicU8>,
}

impl EventEmitter {
    /// Raise an event. Returns `false` if it was filtered out, the channel
    /// is full, or the pipeline is gone.
    pub fn emit(&self, event: SourceEvent) -> bool {
        if !passes(self.mask.load(Ordering::SeqCst), &event) {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("event channel full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Signal that the page visit is ending.
    ///
    /// Uses a blocking send so the notification is never lost to a full channel.
    pub fn teardown(&self) -> bool {
        self.sender.send(SourceEvent::Teardown).is_ok()
    }
}
