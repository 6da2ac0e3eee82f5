// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// WebSocket connection to the session server.
pub mod connection;
/// Connect URL and origin construction.
pub mod endpoint;
/// Connection lifecycle state.
pub mod state;

pub use connection::{ConnectionManager, DEFAULT_MAX_FRAME_SIZE, HANDSHAKE};
pub use endpoint::{DEFAULT_SERVER_URL, Endpoint, SessionId};
pub use state::ConnectionState;
