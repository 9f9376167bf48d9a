//! Synchronizer lifecycle state

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the synchronizer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncState {
    /// Service constructed, poller not yet looping
    Starting = 0,
    /// Poller loop is active
    Running = 1,
    /// Cancellation observed, draining
    Terminating = 2,
    /// Drained; hook handlers short-circuit from here on
    Terminated = 3,
}

impl From<u8> for SyncState {
    fn from(value: u8) -> Self {
        match value {
            1 => SyncState::Running,
            2 => SyncState::Terminating,
            3 => SyncState::Terminated,
            _ => SyncState::Starting,
        }
    }
}

/// Atomic cell holding a [`SyncState`].
///
/// Single writer (the poller task); hook handlers read with acquire
/// semantics so a terminated flag published on shutdown is visible.
pub struct SyncStateCell(AtomicU8);

impl SyncStateCell {
    /// Create a cell in the `Starting` state
    pub fn new() -> Self {
        Self(AtomicU8::new(SyncState::Starting as u8))
    }

    /// Current state
    pub fn get(&self) -> SyncState {
        SyncState::from(self.0.load(Ordering::Acquire))
    }

    /// Transition to `state`
    pub fn set(&self, state: SyncState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for SyncStateCell {
    fn default() -> Self {
        Self::new()
    }
}
