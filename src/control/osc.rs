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

//! OSC 1.0 message encoding for the engine's control port.
//!
//! Only the argument types the engine's control API uses are supported:
//! `int32` (`i`) and `string` (`s`).

use anyhow::{Context, Result, anyhow, bail};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscArg {
    /// Big-endian 32-bit integer.
    Int(i32),
    /// NUL-terminated string padded to four bytes.
    Str(String),
}

impl OscArg {
    const fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => b'i',
            Self::Str(_) => b's',
        }
    }
}

/// An addressed OSC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscMessage {
    /// Address pattern, e.g. `/run-code`.
    pub address: String,
    /// Arguments in order.
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Creates a message with no arguments.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Encodes the message into a datagram payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        put_padded_str(&mut buf, self.address.as_bytes());

        let mut tags = Vec::with_capacity(self.args.len() + 1);
        tags.push(b',');
        tags.extend(self.args.iter().map(OscArg::tag));
        put_padded_str(&mut buf, &tags);

        for arg in &self.args {
            match arg {
                OscArg::Int(n) => buf.put_i32(*n),
                OscArg::Str(s) => put_padded_str(&mut buf, s.as_bytes()),
            }
        }
        buf.freeze()
    }

    fn encoded_len(&self) -> usize {
        let args: usize = self
            .args
            .iter()
            .map(|a| match a {
                OscArg::Int(_) => 4,
                OscArg::Str(s) => padded_len(s.len()),
            })
            .sum();
        padded_len(self.address.len()) + padded_len(self.args.len() + 1) + args
    }

    /// Decodes a datagram payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is truncated, is not valid UTF-8 where
    /// a string is expected, or carries an argument type other than `i` or `s`.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        let address = take_padded_str(&mut buf).context("Failed to read OSC address")?;
        if !address.starts_with('/') {
            bail!("OSC address must start with '/': {address}");
        }

        let tags = take_padded_str(&mut buf).context("Failed to read OSC type tags")?;
        let tags = tags
            .strip_prefix(',')
            .ok_or_else(|| anyhow!("OSC type tags must start with ','"))?;

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.chars() {
            let arg = match tag {
                'i' => {
                    if buf.remaining() < 4 {
                        bail!("Truncated int32 argument");
                    }
                    OscArg::Int(buf.get_i32())
                }
                's' => OscArg::Str(take_padded_str(&mut buf)?),
                other => bail!("Unsupported OSC type tag '{other}'"),
            };
            args.push(arg);
        }

        Ok(Self { address, args })
    }
}

/// Size of `len` bytes plus at least one NUL, rounded up to a multiple of four.
const fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

fn put_padded_str(buf: &mut BytesMut, s: &[u8]) {
    buf.put_slice(s);
    buf.put_bytes(0, padded_len(s.len()) - s.len());
}

fn take_padded_str(buf: &mut &[u8]) -> Result<String> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| anyhow!("Unterminated OSC string"))?;
    let total = padded_len(nul);
    if buf.len() < total {
        bail!("Truncated OSC string padding");
    }
    let s = std::str::from_utf8(&buf[..nul])
        .context("OSC string is not valid UTF-8")?
        .to_string();
    buf.advance(total);
    Ok(s)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn test_encode_stop_all_jobs() {
        let msg = OscMessage::new("/stop-all-jobs").arg(OscArg::Int(111));
        let bytes = msg.encode();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"/stop-all-jobs\0\0");
        expected.extend_from_slice(b",i\0\0");
        expected.extend_from_slice(&111i32.to_be_bytes());
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_encode_run_code() {
        let msg = OscMessage::new("/run-code")
            .arg(OscArg::Int(111))
            .arg(OscArg::Str("play 1".to_string()));
        let bytes = msg.encode();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"/run-code\0\0\0");
        expected.extend_from_slice(b",is\0");
        expected.extend_from_slice(&111i32.to_be_bytes());
        expected.extend_from_slice(b"play 1\0\0");
        assert_eq!(&bytes[..], &expected[..]);
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_aligned_string_gets_full_pad() {
        // A string whose length is already a multiple of four still needs a terminator.
        let msg = OscMessage::new("/abc");
        let bytes = msg.encode();
        assert_eq!(&bytes[..8], b"/abc\0\0\0\0");
        assert_eq!(&bytes[8..], b",\0\0\0");
    }

    #[test]
    fn test_encode_empty_source() {
        let msg = OscMessage::new("/run-code")
            .arg(OscArg::Int(7))
            .arg(OscArg::Str(String::new()));
        let decoded = OscMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded.args[1], OscArg::Str(String::new()));
    }

    #[test]
    fn test_decode_multiline_source() {
        let source = "live_loop :beat do\n  sample :bd_haus\n  sleep 0.5\nend";
        let msg = OscMessage::new("/run-code")
            .arg(OscArg::Int(111))
            .arg(OscArg::Str(source.to_string()));
        assert_eq!(OscMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let bytes = OscMessage::new("/stop-all-jobs")
            .arg(OscArg::Int(111))
            .encode();
        assert!(OscMessage::decode(&bytes[..bytes.len() - 2]).is_err());
        assert!(OscMessage::decode(b"/run-code").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"/x\0\0");
        raw.extend_from_slice(b",f\0\0");
        raw.extend_from_slice(&1.0f32.to_be_bytes());
        let err = OscMessage::decode(&raw).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn test_decode_requires_leading_slash() {
        assert!(OscMessage::decode(b"run\0,\0\0\0").is_err());
    }
}
