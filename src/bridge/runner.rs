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

use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::ReconnectPolicy;
use crate::command::Command;
use crate::control::{ControlClient, JobId};
use crate::error::{BridgeError, ReadError, SendError};
use crate::remote::{
    ConnectionManager, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SERVER_URL, Endpoint, SessionId,
};

/// Default engine control address.
pub const DEFAULT_CONTROL_ADDR: &str = "localhost:4557";
/// Default number of extra attempts for a failed control send.
pub const DEFAULT_SEND_RETRIES: u32 = 2;

/// Everything the bridge needs to run, resolved ahead of time.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Session to attach to.
    pub session: SessionId,
    /// Base URL of the session server (`ws://` or `wss://`).
    pub server_url: String,
    /// Engine control address (`host:port`).
    pub control_addr: String,
    /// Execution slot used for every control message.
    pub job_id: JobId,
    /// Largest frame handed to the parser.
    pub max_frame_size: usize,
    /// Extra attempts for a failed control send before the command is dropped.
    pub send_retries: u32,
    /// Drop frames that are empty after padding is stripped instead of
    /// running empty code.
    pub skip_empty_frames: bool,
    /// What to do when the remote connection is lost.
    pub reconnect: ReconnectPolicy,
}

impl BridgeConfig {
    /// Defaults for everything except the session.
    #[must_use]
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            server_url: DEFAULT_SERVER_URL.to_string(),
            control_addr: DEFAULT_CONTROL_ADDR.to_string(),
            job_id: JobId::DEFAULT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            send_retries: DEFAULT_SEND_RETRIES,
            skip_empty_frames: false,
            reconnect: ReconnectPolicy::never(),
        }
    }
}

/// A command that reached the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// `/stop-all-jobs` was sent.
    Stopped {
        /// Slot that was stopped.
        job: JobId,
    },
    /// `/run-code` was sent.
    Playing {
        /// Slot the code runs on.
        job: JobId,
        /// Code that was sent.
        source: String,
    },
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { .. } => f.write_str("stopped"),
            Self::Playing { source, .. } => write!(f, "playing: {source}"),
        }
    }
}

/// Callback invoked after each successful dispatch.
pub type DispatchCallback = Box<dyn Fn(&Dispatch) + Send + Sync>;

/// Reads commands from the session server and forwards them to the engine.
pub struct Bridge {
    config: BridgeConfig,
    endpoint: Endpoint,
    control: ControlClient,
    cancel: CancellationToken,
    on_dispatch: Option<DispatchCallback>,
}

impl Bridge {
    /// Resolves the endpoint and binds the control socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the control address
    /// cannot be resolved or bound.
    pub async fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let endpoint = Endpoint::new(&config.server_url, &config.session)?;
        let control = ControlClient::bind(&config.control_addr).await?;
        info!(
            "Bridging session {} to engine at {} (job {})",
            config.session,
            control.target(),
            config.job_id
        );
        Ok(Self {
            config,
            endpoint,
            control,
            cancel: CancellationToken::new(),
            on_dispatch: None,
        })
    }

    /// Registers a callback for each dispatched command.
    #[must_use]
    pub fn on_dispatch(mut self, callback: DispatchCallback) -> Self {
        self.on_dispatch = Some(callback);
        self
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops [`Bridge::run`] when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The endpoint being dialed.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Connects and runs the read, classify, dispatch loop.
    ///
    /// Returns `Ok(())` only when cancelled. Connection failures and lost
    /// connections are retried according to the reconnect policy.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is not reconnectable or the reconnect
    /// budget is spent.
    pub async fn run(&self) -> Result<(), BridgeError> {
        let mut failures = 0u32;

        loop {
            let mut conn =
                ConnectionManager::new(self.endpoint.clone(), self.config.max_frame_size);

            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                res = conn.connect() => Some(res),
            };
            let Some(connected) = connected else {
                info!("Cancelled while connecting");
                return Ok(());
            };

            let err = match connected {
                Ok(()) => {
                    failures = 0;
                    match self.pump(&mut conn).await {
                        Ok(()) => {
                            conn.close().await;
                            info!("Bridge stopped");
                            return Ok(());
                        }
                        Err(e) => BridgeError::from(e),
                    }
                }
                Err(e) => e,
            };

            if !err.is_reconnectable() {
                return Err(err);
            }
            failures += 1;
            let Some(delay) = self.config.reconnect.delay(failures) else {
                return Err(err);
            };
            warn!(
                "{err}; reconnecting in {}ms (attempt {failures}/{})",
                delay.as_millis(),
                self.config.reconnect.max_attempts
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("Cancelled while waiting to reconnect");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Reads frames until cancelled or the connection fails.
    async fn pump(&self, conn: &mut ConnectionManager) -> Result<(), ReadError> {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                frame = conn.next_frame() => frame?,
            };
            self.dispatch(Command::parse(&frame)).await;
        }
    }

    /// Sends one command to the engine.
    ///
    /// Failed sends are retried `send_retries` times, then logged and
    /// dropped. Returns what was dispatched, or `None` if nothing was.
    pub async fn dispatch(&self, command: Command) -> Option<Dispatch> {
        if self.config.skip_empty_frames && command.is_empty_run() {
            debug!("Skipping empty frame");
            return None;
        }

        let job = self.config.job_id;
        let dispatch = match command {
            Command::Stop => Dispatch::Stopped { job },
            Command::RunCode { source } => Dispatch::Playing { job, source },
        };

        if let Err(e) = self.send_with_retry(&dispatch).await {
            warn!(
                "Dropping command after {} attempt(s): {e}",
                self.config.send_retries + 1
            );
            return None;
        }

        info!("{dispatch}");
        if let Some(callback) = &self.on_dispatch {
            callback(&dispatch);
        }
        Some(dispatch)
    }

    async fn send_with_retry(&self, dispatch: &Dispatch) -> Result<(), SendError> {
        let mut attempt = 0;
        loop {
            let result = match dispatch {
                Dispatch::Stopped { job } => self.control.send_stop(*job).await,
                Dispatch::Playing { job, source } => self.control.send_run_code(*job, source).await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.config.send_retries => {
                    attempt += 1;
                    debug!(
                        "Control send failed ({e}), retry {attempt}/{}",
                        self.config.send_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
