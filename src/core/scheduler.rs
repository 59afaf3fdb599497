//! Timers that trigger batched sends.
//!
//! The scheduler does not own a thread. The event loop asks it for the next
//! deadline and calls [`DeliveryScheduler::poll`] with the current instant.

use std::time::{Duration, Instant};

/// Why a send was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The one-shot deferred send; always an init request
    Deferred,
    /// The recurring append tick
    Recurring,
}

/// Owns the deferred first send and the recurring append timer.
#[derive(Debug)]
pub struct DeliveryScheduler {
    interval: Duration,
    deferred_at: Option<Instant>,
    recurring_at: Option<Instant>,
}

impl DeliveryScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deferred_at: None,
            recurring_at: None,
        }
    }

    /// Arm the one-shot send to fire one interval after `now`.
    ///
    /// A deadline past the range of `Instant` never fires.
    pub fn arm_deferred(&mut self, now: Instant) {
        self.deferred_at = now.checked_add(self.interval);
    }

    /// Start the recurring timer. Has no effect if it is already running.
    pub fn start_recurring(&mut self, now: Instant) {
        if self.recurring_at.is_none() {
            self.recurring_at = now.checked_add(self.interval);
        }
    }

    pub fn is_deferred_armed(&self) -> bool {
        self.deferred_at.is_some()
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring_at.is_some()
    }

    /// Stop both timers.
    pub fn disarm(&mut self) {
        self.deferred_at = None;
        self.recurring_at = None;
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.deferred_at, self.recurring_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Return the trigger that is due at `now`, if any.
    ///
    /// The deferred send takes precedence. A recurring tick that was missed by
    /// several intervals fires once and is rescheduled past `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Trigger> {
        if self.deferred_at.is_some_and(|at| at <= now) {
            self.deferred_at = None;
            return Some(Trigger::Deferred);
        }

        let due = self.recurring_at.filter(|at| *at <= now)?;
        self.recurring_at = self.next_after(due, now);
        Some(Trigger::Recurring)
    }

    /// First deadline on the `due` phase that lies after `now`.
    fn next_after(&self, due: Instant, now: Instant) -> Option<Instant> {
        let next = due.checked_add(self.interval)?;
        if next > now {
            return Some(next);
        }
        // Skip whole missed periods, keeping the original phase.
        let interval = self.interval.as_nanos().max(1);
        let missed = (now - next).as_nanos() / interval + 1;
        let skipped = u32::try_from(missed)
            .ok()
            .and_then(|n| self.interval.checked_mul(n))
            .and_then(|skip| next.checked_add(skip));
        match skipped {
            Some(at) if at > now => Some(at),
            _ => now.checked_add(self.interval),
        }
    }
}
