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

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace};

use super::endpoint::Endpoint;
use super::state::ConnectionState;
use crate::error::{BridgeError, ConnectError, ReadError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Readiness signal written right after the upgrade.
pub const HANDSHAKE: &str = "drop the beat";

/// Largest frame handed to the parser; longer messages are split.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512;

/// Owns the single WebSocket connection to the session server.
pub struct ConnectionManager {
    endpoint: Endpoint,
    max_frame_size: usize,
    state: ConnectionState,
    stream: Option<WsStream>,
    /// Unread tail of a message longer than `max_frame_size`.
    pending: BytesMut,
    /// Whether `pending` holds UTF-8 text that must be cut on char boundaries.
    pending_text: bool,
}

impl ConnectionManager {
    /// Creates an idle manager for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint, max_frame_size: usize) -> Self {
        Self {
            endpoint,
            max_frame_size: max_frame_size.max(1),
            state: ConnectionState::Idle,
            stream: None,
            pending: BytesMut::new(),
            pending_text: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The endpoint this manager dials.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("Connection {} -> {}", self.state, next);
        self.state = next;
    }

    fn mark_closed(&mut self) {
        self.stream = None;
        if self.state.can_transition_to(ConnectionState::Closed) {
            self.transition(ConnectionState::Closed);
        }
    }

    /// Dials the endpoint with the configured origin and sends the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connect`] if the manager was already used or the
    /// transport cannot be opened, and [`BridgeError::Handshake`] if the
    /// readiness payload cannot be written. Either leaves the manager closed.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectError::State(self.state).into());
        }
        self.transition(ConnectionState::Dialing);

        let request = match self.request() {
            Ok(request) => request,
            Err(e) => {
                self.mark_closed();
                return Err(e.into());
            }
        };

        info!("Connecting to {}", self.endpoint);
        let mut stream = match connect_async(request).await {
            Ok((stream, response)) => {
                debug!("Upgrade response: {}", response.status());
                stream
            }
            Err(e) => {
                self.mark_closed();
                return Err(self.transport_error(e).into());
            }
        };

        if let Err(e) = stream.send(Message::text(HANDSHAKE)).await {
            self.mark_closed();
            return Err(BridgeError::Handshake(Box::new(e)));
        }

        self.stream = Some(stream);
        self.transition(ConnectionState::Connected);
        info!("Connected to {}", self.endpoint);
        Ok(())
    }

    fn request(&self) -> Result<Request, ConnectError> {
        let mut request = self
            .endpoint
            .url()
            .as_str()
            .into_client_request()
            .map_err(|e| self.transport_error(e))?;
        let origin = HeaderValue::from_str(self.endpoint.origin())
            .map_err(|e| self.transport_error(tungstenite::Error::HttpFormat(e.into())))?;
        request.headers_mut().insert(ORIGIN, origin);
        Ok(request)
    }

    fn transport_error(&self, source: tungstenite::Error) -> ConnectError {
        ConnectError::Transport {
            url: self.endpoint.to_string(),
            source: Box::new(source),
        }
    }

    /// Waits for the next frame of at most `max_frame_size` bytes.
    ///
    /// Text and binary messages are delivered in arrival order; a message
    /// longer than the limit comes back as consecutive chunks. Text chunks
    /// never split a character. Control frames are skipped.
    ///
    /// Cancel-safe: dropping the future loses no data.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager is not connected, the server closes
    /// the connection, or the transport fails. The manager is closed
    /// afterwards.
    pub async fn next_frame(&mut self) -> Result<Bytes, ReadError> {
        if !self.pending.is_empty() {
            return Ok(self.take_chunk());
        }

        loop {
            let next = match self.stream.as_mut() {
                Some(stream) => stream.next().await,
                None => return Err(ReadError::NotConnected(self.state)),
            };

            match next {
                Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                    let is_text = message.is_text();
                    let data = message.into_data();
                    trace!("Received frame ({} bytes)", data.len());
                    if data.len() <= self.max_frame_size {
                        return Ok(data);
                    }
                    debug!(
                        "Splitting {}-byte message into {}-byte frames",
                        data.len(),
                        self.max_frame_size
                    );
                    self.pending.extend_from_slice(&data);
                    self.pending_text = is_text;
                    return Ok(self.take_chunk());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server sent close: {:?}", frame);
                    self.mark_closed();
                    return Err(ReadError::Closed);
                }
                Some(Ok(other)) => {
                    trace!("Ignoring control frame: {:?}", other);
                }
                Some(Err(e)) => {
                    self.mark_closed();
                    return Err(match e {
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                            ReadError::Closed
                        }
                        other => ReadError::Transport(Box::new(other)),
                    });
                }
                None => {
                    self.mark_closed();
                    return Err(ReadError::Closed);
                }
            }
        }
    }

    fn take_chunk(&mut self) -> Bytes {
        let mut n = self.pending.len().min(self.max_frame_size);
        if self.pending_text {
            n = char_boundary(&self.pending, n);
        }
        let chunk = self.pending.split_to(n).freeze();
        if self.pending.is_empty() {
            self.pending_text = false;
        }
        chunk
    }

    /// Sends a close frame if connected and marks the manager closed.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Error closing connection: {}", e);
            }
        }
        self.pending.clear();
        self.pending_text = false;
        self.mark_closed();
    }
}

/// Largest cut point at or below `at` that does not land inside a UTF-8
/// sequence. If the first character alone is longer than `at`, the cut moves
/// forward to the end of that character instead.
fn char_boundary(buf: &[u8], at: usize) -> usize {
    let is_continuation = |b: u8| b & 0xC0 == 0x80;
    let mut n = at;
    while n > 0 && n < buf.len() && is_continuation(buf[n]) {
        n -= 1;
    }
    if n == 0 {
        n = at.max(1);
        while n < buf.len() && is_continuation(buf[n]) {
            n += 1;
        }
    }
    n
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::remote::SessionId;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response,
    };

    struct Seen {
        uri: String,
        origin: Option<String>,
        handshake: String,
    }

    /// One-shot server: records the upgrade request and handshake, plays
    /// `script`, then closes.
    async fn server(script: Vec<Message>) -> (String, JoinHandle<Seen>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("ws://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let (tx, rx) = oneshot::channel();
            let callback = move |req: &ServerRequest,
                                 resp: Response|
                  -> Result<Response, ErrorResponse> {
                let origin = req
                    .headers()
                    .get("origin")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = tx.send((req.uri().to_string(), origin));
                Ok(resp)
            };
            let mut ws = accept_hdr_async(tcp, callback).await.unwrap();
            let (uri, origin) = rx.await.unwrap();

            let handshake = ws.next().await.unwrap().unwrap().into_text().unwrap();
            for message in script {
                ws.send(message).await.unwrap();
            }
            let _ = ws.close(None).await;

            Seen {
                uri,
                origin,
                handshake: handshake.as_str().to_string(),
            }
        });

        (base, handle)
    }

    fn manager(base: &str, max: usize) -> ConnectionManager {
        let session = SessionId::new("beat-box").unwrap();
        ConnectionManager::new(Endpoint::new(base, &session).unwrap(), max)
    }

    #[tokio::test]
    async fn test_connect_sends_origin_and_handshake() {
        let (base, server) = server(vec![]).await;
        let mut conn = manager(&base, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(conn.state(), ConnectionState::Idle);

        conn.connect().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);

        let seen = server.await.unwrap();
        assert_eq!(seen.uri, "/minion/v1/connect/beat-box?type=minion-sonic");
        let expected_origin = format!("{}/", base.replacen("ws://", "http://", 1));
        assert_eq!(seen.origin.as_deref(), Some(expected_origin.as_str()));
        assert_eq!(seen.handshake, HANDSHAKE);
    }

    #[tokio::test]
    async fn test_frames_in_order_then_closed() {
        let (base, _server) = server(vec![
            Message::text("play 1"),
            Message::Ping(Bytes::from_static(b"hi")),
            Message::binary(b"stop".to_vec()),
        ])
        .await;
        let mut conn = manager(&base, DEFAULT_MAX_FRAME_SIZE);
        conn.connect().await.unwrap();

        assert_eq!(&conn.next_frame().await.unwrap()[..], b"play 1");
        assert_eq!(&conn.next_frame().await.unwrap()[..], b"stop");
        assert!(matches!(conn.next_frame().await, Err(ReadError::Closed)));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            conn.next_frame().await,
            Err(ReadError::NotConnected(ConnectionState::Closed))
        ));
    }

    #[tokio::test]
    async fn test_long_message_is_chunked() {
        let long = "x".repeat(1200);
        let (base, _server) = server(vec![Message::text(long), Message::text("next")]).await;
        let mut conn = manager(&base, 512);
        conn.connect().await.unwrap();

        assert_eq!(conn.next_frame().await.unwrap().len(), 512);
        assert_eq!(conn.next_frame().await.unwrap().len(), 512);
        assert_eq!(conn.next_frame().await.unwrap().len(), 176);
        assert_eq!(&conn.next_frame().await.unwrap()[..], b"next");
    }

    #[tokio::test]
    async fn test_text_chunks_keep_characters_whole() {
        let original = format!("{}é", "a".repeat(511));
        let (base, _server) = server(vec![Message::text(original.clone())]).await;
        let mut conn = manager(&base, 512);
        conn.connect().await.unwrap();

        let first = conn.next_frame().await.unwrap();
        let second = conn.next_frame().await.unwrap();
        assert_eq!(first.len(), 511);
        assert_eq!(&second[..], "é".as_bytes());

        let reassembled = format!(
            "{}{}",
            std::str::from_utf8(&first).unwrap(),
            std::str::from_utf8(&second).unwrap()
        );
        assert_eq!(reassembled, original);
    }

    #[tokio::test]
    async fn test_binary_chunks_split_at_byte_limit() {
        let mut data = vec![b'a'; 511];
        data.extend_from_slice("é".as_bytes());
        let (base, _server) = server(vec![Message::binary(data)]).await;
        let mut conn = manager(&base, 512);
        conn.connect().await.unwrap();

        assert_eq!(conn.next_frame().await.unwrap().len(), 512);
        assert_eq!(conn.next_frame().await.unwrap().len(), 1);
    }

    #[test]
    fn test_char_boundary() {
        let text = "aé€".as_bytes(); // 1 + 2 + 3 bytes
        assert_eq!(char_boundary(text, 6), 6);
        assert_eq!(char_boundary(text, 5), 3);
        assert_eq!(char_boundary(text, 4), 3);
        assert_eq!(char_boundary(text, 2), 1);
        assert_eq!(char_boundary(text, 1), 1);
        // A character wider than the limit is kept whole.
        assert_eq!(char_boundary("€".as_bytes(), 1), 3);
    }

    #[tokio::test]
    async fn test_exact_max_size_is_one_frame() {
        let exact = "y".repeat(512);
        let (base, _server) = server(vec![Message::text(exact.clone())]).await;
        let mut conn = manager(&base, 512);
        conn.connect().await.unwrap();

        assert_eq!(&conn.next_frame().await.unwrap()[..], exact.as_bytes());
        assert!(matches!(conn.next_frame().await, Err(ReadError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_refused_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut conn = manager(&base, DEFAULT_MAX_FRAME_SIZE);
        let err = conn.connect().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Connect(ConnectError::Transport { .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let (base, _server) = server(vec![]).await;
        let mut conn = manager(&base, DEFAULT_MAX_FRAME_SIZE);
        conn.connect().await.unwrap();

        let err = conn.connect().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Connect(ConnectError::State(ConnectionState::Connected))
        ));
    }

    #[tokio::test]
    async fn test_read_before_connect() {
        let mut conn = manager("ws://127.0.0.1:1", DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(
            conn.next_frame().await,
            Err(ReadError::NotConnected(ConnectionState::Idle))
        ));
    }
}
