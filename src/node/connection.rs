//! Connection liveness as seen by the node
//!
//! The node never touches the socket itself. The I/O layer reports the
//! connection state and the node answers `is_available` from it.

use std::sync::atomic::{AtomicU8, Ordering};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Connected and ready
    Connected = 0,
    /// Connecting in progress
    Connecting = 1,
    /// Disconnected
    Disconnected = 2,
    /// Reconnecting after failure
    Reconnecting = 3,
}

impl ConnectionState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Connecting,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Liveness check delegated to the transport
pub trait Liveness: Send + Sync {
    /// True iff the underlying connection is currently active
    fn is_active(&self) -> bool;
}

/// Connection state cell shared between the I/O layer and the node
#[derive(Debug)]
pub struct ConnectionStatus {
    state: AtomicU8,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(ConnectionState::Connecting)
    }
}

impl Liveness for ConnectionStatus {
    #[inline]
    fn is_active(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Liveness of a transport that is always up (tests, loopback)
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysActive;

impl Liveness for AlwaysActive {
    #[inline]
    fn is_active(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connected_is_active() {
        let status = ConnectionStatus::default();
        assert_eq!(status.state(), ConnectionState::Connecting);
        assert!(!status.is_active());

        status.set_state(ConnectionState::Connected);
        assert!(status.is_active());

        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Reconnecting,
            ConnectionState::Connecting,
        ] {
            status.set_state(state);
            assert_eq!(status.state(), state);
            assert!(!status.is_active());
        }
    }

    #[test]
    fn test_always_active() {
        assert!(AlwaysActive.is_active());
    }
}
