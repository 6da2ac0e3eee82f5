// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Shared fixtures: a scripted session server and a UDP engine stand-in.

#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use minion_sonic::bridge::{Dispatch, DispatchCallback};
use minion_sonic::control::OscMessage;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// What the server does with one accepted connection.
pub struct Script {
    /// Messages pushed to the client after the handshake.
    pub frames: Vec<Message>,
    /// Keep the connection open until the client goes away instead of closing.
    pub hold_open: bool,
}

impl Script {
    pub fn closing(frames: &[&str]) -> Self {
        Self {
            frames: frames.iter().map(|f| Message::text(*f)).collect(),
            hold_open: false,
        }
    }

    pub fn holding(frames: &[&str]) -> Self {
        Self {
            hold_open: true,
            ..Self::closing(frames)
        }
    }
}

/// What the server observed on one connection.
#[derive(Debug)]
pub struct Accepted {
    pub uri: String,
    pub origin: Option<String>,
    pub handshake: String,
}

pub struct MockServer {
    pub base_url: String,
    pub handle: JoinHandle<Result<Vec<Accepted>>>,
}

/// Accepts one connection per script, in order, then stops listening.
pub async fn spawn_server(scripts: Vec<Script>) -> Result<MockServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("ws://{}", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        let mut accepted = Vec::new();
        for script in scripts {
            let (tcp, _) = listener.accept().await?;
            let (tx, rx) = oneshot::channel();
            let callback =
                move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let origin = req
                        .headers()
                        .get("origin")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let _ = tx.send((req.uri().to_string(), origin));
                    Ok(resp)
                };
            let mut ws = accept_hdr_async(tcp, callback).await?;
            let (uri, origin) = rx.await?;

            let handshake = match ws.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                other => bail!("expected handshake, got {other:?}"),
            };

            for frame in script.frames {
                ws.send(frame).await?;
            }

            if script.hold_open {
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            } else {
                let _ = ws.close(None).await;
            }

            accepted.push(Accepted {
                uri,
                origin,
                handshake,
            });
        }
        Ok::<_, anyhow::Error>(accepted)
    });

    Ok(MockServer { base_url, handle })
}

/// A UDP socket standing in for the engine's control port.
pub async fn engine() -> Result<(UdpSocket, String)> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?.to_string();
    Ok((socket, addr))
}

/// Next control message received by the engine.
pub async fn recv(engine: &UdpSocket) -> Result<OscMessage> {
    let mut buf = [0u8; 4096];
    let (n, _) = timeout(TIMEOUT, engine.recv_from(&mut buf))
        .await
        .context("timed out waiting for control message")??;
    OscMessage::decode(&buf[..n])
}

/// Fails if anything arrives at the engine within `wait`.
pub async fn assert_silent(engine: &UdpSocket, wait: Duration) -> Result<()> {
    let mut buf = [0u8; 4096];
    if let Ok(received) = timeout(wait, engine.recv_from(&mut buf)).await {
        let (n, _) = received?;
        bail!(
            "unexpected control message: {:?}",
            OscMessage::decode(&buf[..n])
        );
    }
    Ok(())
}

/// Address of a TCP port with nothing listening on it.
pub async fn closed_port() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    drop(listener);
    Ok(addr)
}

/// Collects every dispatch the bridge reports.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Dispatch>>>);

impl Recorder {
    pub fn callback(&self) -> DispatchCallback {
        let seen = Arc::clone(&self.0);
        Box::new(move |d: &Dispatch| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(d.clone());
            }
        })
    }

    pub fn seen(&self) -> Vec<Dispatch> {
        self.0.lock().map(|seen| seen.to_vec()).unwrap_or_default()
    }
}
