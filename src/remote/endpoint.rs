// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Remote endpoint construction.

use std::fmt;
use url::{ParseError, Url};

use crate::error::ConnectError;

/// Server the minion connects to unless configured otherwise.
pub const DEFAULT_SERVER_URL: &str = "wss://emet.cc.au.dk";

/// Client type announced in the connect URL's query string.
pub const CLIENT_TYPE: &str = "minion-sonic";

/// Opaque identifier of the webstrate session to attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session id. Returns `None` for an empty or blank id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully resolved connect URL plus the `Origin` header value sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    origin: String,
}

impl Endpoint {
    /// Builds `<server>/minion/v1/connect/<session>?type=minion-sonic`.
    ///
    /// The session id always fills exactly one path segment; `/`, spaces and
    /// other reserved characters in it are percent-encoded.
    ///
    /// The origin is the same host over `https` (or `http` for plain `ws`),
    /// with a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns an error if `server_url` does not parse or is not `ws`/`wss`.
    pub fn new(server_url: &str, session: &SessionId) -> Result<Self, ConnectError> {
        let base = Url::parse(server_url)?;
        let origin_scheme = match base.scheme() {
            "wss" => "https",
            "ws" => "http",
            other => return Err(ConnectError::Scheme(other.to_string())),
        };

        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| ConnectError::Endpoint(ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["minion", "v1", "connect", session.as_str()]);
        url.query_pairs_mut().append_pair("type", CLIENT_TYPE);

        let mut origin = base;
        origin
            .set_scheme(origin_scheme)
            .map_err(|()| ConnectError::Scheme(origin_scheme.to_string()))?;
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(Self {
            url,
            origin: origin.into(),
        })
    }

    /// The connect URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The `Origin` header value.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}
