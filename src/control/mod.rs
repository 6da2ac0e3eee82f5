// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// UDP client for the engine's control port.
pub mod client;
/// OSC message encoding.
pub mod osc;

pub use client::{ControlClient, JobId, RUN_CODE, STOP_ALL_JOBS};
pub use osc::{OscArg, OscMessage};
