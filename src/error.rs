// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Error types for the remote connection, the control channel, and the bridge loop.

use std::io;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::remote::ConnectionState;

/// The remote connection could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server base URL or session id did not form a valid endpoint.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// The endpoint uses a scheme other than `ws` or `wss`.
    #[error("unsupported scheme '{0}' (expected ws or wss)")]
    Scheme(String),

    /// `connect` was called on a manager that has already been used.
    #[error("connection manager is {0}, expected idle")]
    State(ConnectionState),

    /// The WebSocket upgrade or the underlying transport failed.
    #[error("failed to connect to {url}: {source}")]
    Transport {
        /// The endpoint that was dialed.
        url: String,
        /// Transport failure.
        #[source]
        source: Box<tungstenite::Error>,
    },
}

/// Reading the next frame from the remote connection failed.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The remote side closed the connection.
    #[error("connection closed by remote")]
    Closed,

    /// No connection is open.
    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// Transport-level failure while reading.
    #[error("read failed: {0}")]
    Transport(#[source] Box<tungstenite::Error>),
}

/// A control message could not be delivered to the local engine.
#[derive(Debug, Error)]
pub enum SendError {
    /// The control address did not resolve to any socket address.
    #[error("could not resolve control address '{addr}'")]
    Resolve {
        /// The configured address.
        addr: String,
        /// Lookup failure, if the resolver reported one.
        #[source]
        source: Option<io::Error>,
    },

    /// Socket-level failure.
    #[error("control socket error: {0}")]
    Io(#[from] io::Error),

    /// The datagram was only partially written.
    #[error("short write: {sent} of {len} bytes sent")]
    Truncated {
        /// Bytes written.
        sent: usize,
        /// Bytes in the encoded message.
        len: usize,
    },
}

/// Any failure that ends a bridge run.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The remote connection could not be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The readiness payload could not be written after connecting.
    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<tungstenite::Error>),

    /// The remote connection failed or closed while reading.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The local control channel failed.
    #[error(transparent)]
    Send(#[from] SendError),
}

impl BridgeError {
    /// Whether the bridge may attempt a fresh connection after this error.
    #[must_use]
    pub const fn is_reconnectable(&self) -> bool {
        matches!(
            self,
            Self::Connect(ConnectError::Transport { .. })
                | Self::Read(ReadError::Closed | ReadError::Transport(_))
        )
    }
}
