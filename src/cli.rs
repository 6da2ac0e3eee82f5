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

//! CLI utilities for terminal output formatting and colors.

use crossterm::tty::IsTty;
use std::io::stdout;

use crate::bridge::Dispatch;

/// Configuration for color output
#[derive(Debug, Clone, Copy)]
pub struct ColorConfig {
    pub enabled: bool,
}

impl ColorConfig {
    /// Create a new ColorConfig, auto-detecting TTY unless nocolor is true
    pub fn new(nocolor: bool) -> Self {
        Self {
            enabled: !nocolor && stdout().is_tty(),
        }
    }

    fn paint(&self, code: u8, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    /// ANSI escape code for green (code sent to the engine)
    pub fn green(&self, s: &str) -> String {
        self.paint(32, s)
    }

    /// ANSI escape code for red (stop)
    pub fn red(&self, s: &str) -> String {
        self.paint(31, s)
    }
}

/// Formats the stdout line printed for each dispatched command.
///
/// `playing: <source>` for code, `stopped` for a stop. The source is printed
/// verbatim, newlines included.
pub fn format_dispatch(dispatch: &Dispatch, colors: &ColorConfig) -> String {
    match dispatch {
        Dispatch::Stopped { .. } => colors.red("stopped"),
        Dispatch::Playing { source, .. } => format!("{} {source}", colors.green("playing:")),
    }
}
