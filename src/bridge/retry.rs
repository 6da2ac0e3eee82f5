// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Reconnect policy for the remote connection.

use std::time::Duration;

/// Default delay before the first reconnect attempt in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 500;
/// Default cap on the reconnect delay in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// How many times, and how patiently, the bridge re-dials after losing the
/// remote connection.
///
/// Delays double on each consecutive failure up to `max_backoff`. A
/// successful connect resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive reconnect attempts allowed; zero makes every connection
    /// loss final.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    #[must_use]
    pub const fn never() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }

    /// Delay before the `attempt`-th consecutive reconnect (1-based), or
    /// `None` once the attempt budget is spent.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(
            self.initial_backoff
                .saturating_mul(factor)
                .min(self.max_backoff),
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::never()
    }
}
