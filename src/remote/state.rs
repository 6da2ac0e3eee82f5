// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Connection lifecycle state.

use std::fmt;

/// Lifecycle of a single remote connection.
///
/// Transitions only move forward: `Idle -> Dialing -> Connected -> Closed`,
/// with `Dialing -> Closed` when the dial or handshake fails. `Closed` is
/// terminal; reconnecting means building a new manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet dialed.
    Idle,
    /// Transport and upgrade in progress.
    Dialing,
    /// Handshake sent, frames can be read.
    Connected,
    /// Connection ended.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal forward edge.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Dialing)
                | (Self::Dialing, Self::Connected | Self::Closed)
                | (Self::Connected, Self::Closed)
        )
    }

    /// Lowercase name, used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dialing => "dialing",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
