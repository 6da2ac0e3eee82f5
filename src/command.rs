// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Classification of inbound frames into commands.
//!
//! A frame is opaque text. Anything starting with `stop` halts the engine;
//! everything else is treated verbatim as code to run.

/// Prefix that turns a frame into a stop command.
pub const STOP_PREFIX: &str = "stop";

/// A command received from the remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Halt all running code.
    Stop,
    /// Run the given source.
    RunCode {
        /// Source text, exactly as received minus trailing padding.
        source: String,
    },
}

impl Command {
    /// Classifies one raw frame.
    ///
    /// Trailing NUL padding is stripped first. Invalid UTF-8 is replaced
    /// rather than rejected, so every frame yields a command.
    #[must_use]
    pub fn parse(frame: &[u8]) -> Self {
        let text = String::from_utf8_lossy(trim_padding(frame));
        if text.starts_with(STOP_PREFIX) {
            Self::Stop
        } else {
            Self::RunCode {
                source: text.into_owned(),
            }
        }
    }

    /// Whether this is a run command with no source.
    #[must_use]
    pub const fn is_empty_run(&self) -> bool {
        matches!(self, Self::RunCode { source } if source.is_empty())
    }
}

/// Returns `frame` without its trailing zero bytes.
#[must_use]
pub fn trim_padding(frame: &[u8]) -> &[u8] {
    let end = frame.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &frame[..end]
}
