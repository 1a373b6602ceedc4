//! Session lifecycle state of a connection endpoint.

use std::sync::atomic::{AtomicU8, Ordering};

/// WebSocket session state. An endpoint exists only after a successful
/// handshake, so it starts out `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Open for data transfer.
    Open,
    /// Close frame sent, waiting for the peer's close.
    Closing,
    /// Fully closed.
    Closed,
}

impl ConnectionState {
    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// State shared between the endpoint handle and its reader task.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`; returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
