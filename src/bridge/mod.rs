// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Reconnect backoff.
pub mod retry;
/// The read, classify, dispatch loop.
mod runner;

pub use retry::ReconnectPolicy;
pub use runner::{
    Bridge, BridgeConfig, DEFAULT_CONTROL_ADDR, DEFAULT_SEND_RETRIES, Dispatch, DispatchCallback,
};
