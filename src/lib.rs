// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! minion-sonic bridges a webstrate session to a local Sonic Pi engine.
//!
//! Text pushed over the session's WebSocket is classified into commands and
//! forwarded to the engine as OSC control messages.

/// The read, classify, dispatch loop and its policies.
pub mod bridge;
/// Command-line output helpers.
pub mod cli;
/// Classification of inbound frames.
pub mod command;
/// Layered configuration (dotfile, config dir, explicit file, environment).
pub mod config;
/// OSC client for the engine's control port.
pub mod control;
/// Error types.
pub mod error;
/// Connection to the session server.
pub mod remote;
