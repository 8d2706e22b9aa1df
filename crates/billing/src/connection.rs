//! Readiness of the billing channel.
//!
//! ```text
//!                StartConnect            SetupSucceeded
//!  Disconnected ─────────────► Connecting ─────────────► Ready
//!       ▲                          │                        │
//!       └──────── SetupFailed ─────┘                        │
//!       └──────────────────── ChannelLost ──────────────────┘
//! ```
//!
//! `Release` returns to `Disconnected` from any state. A channel loss while
//! already disconnected is accepted as a no-op.

use thiserror::Error;

// =============================================================================
// ConnectionState
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No usable channel.
    #[default]
    Disconnected,
    /// Waiting for the billing service to finish setup.
    Connecting,
    /// Channel is usable.
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ConnectionEvent
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection requested, either by `initialize` or by a service reconnect.
    StartConnect,
    /// Billing setup finished with an OK response.
    SetupSucceeded,
    /// Billing setup finished with a failure response.
    SetupFailed,
    /// The service reported the channel as lost.
    ChannelLost,
    /// The host released the coordinator.
    Release,
}

/// Returned when an event cannot be applied in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal connection transition: {from} + {event:?}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

// =============================================================================
// ConnectionStateMachine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl ConnectionStateMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready)
    }

    /// Apply an event and return the new state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] for an illegal event; the state is left
    /// unchanged.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<ConnectionState, TransitionError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let next = match (self.state, event) {
            (_, E::Release) => S::Disconnected,
            (S::Disconnected, E::StartConnect) => S::Connecting,
            (S::Connecting, E::SetupSucceeded) => S::Ready,
            (S::Connecting, E::SetupFailed)
            | (S::Connecting | S::Ready | S::Disconnected, E::ChannelLost) => S::Disconnected,
            (from, event) => return Err(TransitionError { from, event }),
        };
        self.state = next;
        Ok(next)
    }
}
