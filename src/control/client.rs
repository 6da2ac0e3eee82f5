/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use serde::Deserialize;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, trace};

use super::osc::{OscArg, OscMessage};
use crate::error::SendError;

/// Address of the engine's "halt everything on this job" handler.
pub const STOP_ALL_JOBS: &str = "/stop-all-jobs";
/// Address of the engine's "evaluate this source on this job" handler.
pub const RUN_CODE: &str = "/run-code";

/// Execution slot targeted by control messages.
///
/// The engine tags every evaluation with a job id so it can be stopped as a
/// group later. The bridge addresses a single slot for the whole process;
/// 111 is the value the minion has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i32);

impl JobId {
    /// The slot used unless configured otherwise.
    pub const DEFAULT: Self = Self(111);
}

impl Default for JobId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Fire-and-forget OSC client for the local engine.
///
/// Owns one UDP socket for its lifetime. Sends are not acknowledged; the only
/// failures reported are local socket errors.
#[derive(Debug)]
pub struct ControlClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl ControlClient {
    /// Resolves `addr` and binds a local socket for sending to it.
    ///
    /// IPv4 results are preferred so that `localhost` reaches an engine
    /// listening on `127.0.0.1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not resolve or no local socket
    /// can be bound.
    pub async fn bind(addr: &str) -> Result<Self, SendError> {
        let candidates: Vec<SocketAddr> = lookup_host(addr)
            .await
            .map_err(|e| SendError::Resolve {
                addr: addr.to_string(),
                source: Some(e),
            })?
            .collect();

        let target = candidates
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| SendError::Resolve {
                addr: addr.to_string(),
                source: None,
            })?;

        let local = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        debug!("Control client bound to {} -> {}", socket.local_addr()?, target);

        Ok(Self { socket, target })
    }

    /// The resolved engine address.
    #[must_use]
    pub const fn target(&self) -> SocketAddr {
        self.target
    }

    /// Asks the engine to halt everything running under `job`.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram could not be written.
    pub async fn send_stop(&self, job: JobId) -> Result<(), SendError> {
        self.send(&stop_message(job)).await
    }

    /// Asks the engine to evaluate `source` under `job`.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram could not be written.
    pub async fn send_run_code(&self, job: JobId, source: &str) -> Result<(), SendError> {
        self.send(&run_code_message(job, source)).await
    }

    /// Encodes and sends one message.
    ///
    /// # Errors
    ///
    /// Returns an error on socket failure or a short write.
    pub async fn send(&self, message: &OscMessage) -> Result<(), SendError> {
        let payload = message.encode();
        let sent = self.socket.send_to(&payload, self.target).await?;
        if sent != payload.len() {
            return Err(SendError::Truncated {
                sent,
                len: payload.len(),
            });
        }
        trace!("Sent {} ({} bytes) to {}", message.address, sent, self.target);
        Ok(())
    }
}

/// Builds the `/stop-all-jobs` message for `job`.
#[must_use]
pub fn stop_message(job: JobId) -> OscMessage {
    OscMessage::new(STOP_ALL_JOBS).arg(OscArg::Int(job.0))
}

/// Builds the `/run-code` message for `job` carrying `source` verbatim.
#[must_use]
pub fn run_code_message(job: JobId, source: &str) -> OscMessage {
    OscMessage::new(RUN_CODE)
        .arg(OscArg::Int(job.0))
        .arg(OscArg::Str(source.to_string()))
}
