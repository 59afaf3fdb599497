//! Single-fire teardown hook.

/// Tracks whether the teardown flush has been armed and fired.
///
/// The hook fires at most once and cannot be cancelled once armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushCoordinator {
    #[default]
    Disarmed,
    Armed,
    Fired,
}

impl FlushCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the teardown hook. Re-arming after firing has no effect.
    pub fn arm(&mut self) {
        if *self == FlushCoordinator::Disarmed {
            *self = FlushCoordinator::Armed;
        }
    }

    /// Fire the hook. Returns `true` only for the first call on an armed hook.
    pub fn fire(&mut self) -> bool {
        if *self == FlushCoordinator::Armed {
            *self = FlushCoordinator::Fired;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        *self == FlushCoordinator::Armed
    }

    pub fn has_fired(&self) -> bool {
        *self == FlushCoordinator::Fired
    }
}
