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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::bridge::{BridgeConfig, DEFAULT_CONTROL_ADDR, DEFAULT_SEND_RETRIES, ReconnectPolicy};
use crate::bridge::retry::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS};
use crate::control::JobId;
use crate::remote::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_SERVER_URL, SessionId};

/// Prefix for environment overrides (`MINION_SONIC_WEBSTRATE`, ...).
pub const ENV_PREFIX: &str = "MINION_SONIC";

/// Unprefixed variable earlier releases read the webstrate id from.
pub const LEGACY_WEBSTRATE_VAR: &str = "WEBSTRATE";

/// Legacy dotfile name in the home directory, extension chosen by format.
const DOTFILE_STEM: &str = ".minion-sonicpi";
const DOTFILE_EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Id of the webstrate to attach to. Empty means "not configured".
    #[serde(default)]
    pub webstrate: String,

    /// Base URL of the session server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Engine control address (default: localhost:4557)
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Execution slot for all control messages (default: 111)
    #[serde(default)]
    pub job_id: JobId,

    /// Largest frame handed to the parser in bytes (default: 512)
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Extra attempts for a failed control send (default: 2)
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    /// Reconnect attempts after the connection drops (default: 0)
    #[serde(default)]
    pub reconnect_attempts: u32,

    /// First reconnect delay in milliseconds (default: 500)
    #[serde(default = "default_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Reconnect delay cap in milliseconds (default: 30000)
    #[serde(default = "default_max_backoff_ms")]
    pub reconnect_max_backoff_ms: u64,

    /// Ignore frames that are empty once padding is stripped.
    #[serde(default)]
    pub skip_empty_frames: bool,

    /// Config files that were found and merged, lowest priority first.
    #[serde(skip)]
    pub loaded_from: Vec<PathBuf>,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_control_addr() -> String {
    DEFAULT_CONTROL_ADDR.to_string()
}

const fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

const fn default_send_retries() -> u32 {
    DEFAULT_SEND_RETRIES
}

const fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

const fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

/// Directories searched for config files.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Home directory holding the legacy dotfile.
    pub home: Option<PathBuf>,
    /// User config directory holding `minion-sonic/config.toml`.
    pub config_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// The current user's directories.
    #[must_use]
    pub fn discover() -> Self {
        Self {
            home: dirs::home_dir(),
            config_dir: dirs::config_dir(),
        }
    }

    fn dotfile(&self) -> Option<PathBuf> {
        let home = self.home.as_ref()?;
        DOTFILE_EXTENSIONS
            .iter()
            .map(|ext| home.join(format!("{DOTFILE_STEM}.{ext}")))
            .find(|path| path.is_file())
    }

    fn user_file(&self) -> Option<PathBuf> {
        let path = self.config_dir.as_ref()?.join("minion-sonic").join("config.toml");
        path.is_file().then_some(path)
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is malformed, the explicit file is
    /// missing, or a value has the wrong type.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        Self::load_from(&ConfigPaths::discover(), explicit_file, std::env::vars())
    }

    /// Load configuration from the given directories and environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_from(
        paths: &ConfigPaths,
        explicit_file: Option<PathBuf>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut builder = config::Config::builder();
        let mut loaded_from = Vec::new();

        // 1. Start with defaults
        builder = builder
            .set_default("webstrate", "")?
            .set_default("server_url", DEFAULT_SERVER_URL)?
            .set_default("control_addr", DEFAULT_CONTROL_ADDR)?
            .set_default("job_id", i64::from(JobId::DEFAULT.0))?;

        // 2. Legacy dotfile (~/.minion-sonicpi.yaml)
        if let Some(path) = paths.dotfile() {
            builder = builder.add_source(config::File::from(path.clone()));
            loaded_from.push(path);
        }

        // 3. User config directory (~/.config/minion-sonic/config.toml)
        if let Some(path) = paths.user_file() {
            builder = builder.add_source(config::File::from(path.clone()));
            loaded_from.push(path);
        }

        // 4. Explicit file, which must exist
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path.clone()).required(true));
            loaded_from.push(path);
        }

        // 5. Bare WEBSTRATE
        let legacy: HashMap<String, String> = vars
            .iter()
            .filter(|(key, _)| key.as_str() == LEGACY_WEBSTRATE_VAR)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        builder = builder.add_source(config::Environment::default().source(Some(legacy)));

        // 6. Prefixed environment variables (MINION_SONIC_WEBSTRATE, etc.)
        builder =
            builder.add_source(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)));

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        let mut config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.loaded_from = loaded_from;
        Ok(config)
    }

    /// Resolves the bridge settings. Returns `None` when no webstrate is set.
    #[must_use]
    pub fn bridge_config(&self) -> Option<BridgeConfig> {
        let session = SessionId::new(self.webstrate.clone())?;
        Some(BridgeConfig {
            session,
            server_url: self.server_url.clone(),
            control_addr: self.control_addr.clone(),
            job_id: self.job_id,
            max_frame_size: self.max_frame_size,
            send_retries: self.send_retries,
            skip_empty_frames: self.skip_empty_frames,
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect_attempts,
                initial_backoff: Duration::from_millis(self.reconnect_backoff_ms),
                max_backoff: Duration::from_millis(self.reconnect_max_backoff_ms),
            },
        })
    }
}
