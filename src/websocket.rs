// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Websocket Probe Session
 * Minimal full-duplex client used to exercise ws/wss endpoints
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::Protocol;
use crate::errors::{error_chain, CallError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PING_PAYLOAD: &[u8] = b"wc.ping";
const PONG_QUEUE_SIZE: usize = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PING_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
const PONG_WAIT: Duration = Duration::from_secs(5);
const READ_POST_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsMessageKind {
    Text,
    Binary,
}

/// A data frame received from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsMessage {
    pub kind: WsMessageKind,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct WsCounters {
    reads: AtomicU64,
    pings: AtomicU64,
    pongs: AtomicU64,
}

/// Snapshot of the session's frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WsStats {
    pub read_count: u64,
    pub ping_count: u64,
    pub pong_count: u64,
}

pub struct WebsocketSession {
    addr: String,
    protocol: Protocol,
    sink: Option<SplitSink<WsStream, Message>>,
    reader: Option<JoinHandle<()>>,
    done_tx: Option<watch::Sender<bool>>,
    pong_rx: Option<mpsc::Receiver<Vec<u8>>>,
    read_tx: Option<mpsc::Sender<WsMessage>>,
    counters: Arc<WsCounters>,
    close_grace: Duration,
}

impl WebsocketSession {
    pub fn new(protocol: Protocol, host: &str, port: &str) -> Result<Self, CallError> {
        if !protocol.is_websocket() {
            return Err(CallError::Other(format!("invalid ws protocol - {}", protocol)));
        }

        Ok(Self {
            addr: format!("{}://{}:{}", protocol.scheme(), host, port),
            protocol,
            sink: None,
            reader: None,
            done_tx: None,
            pong_rx: None,
            read_tx: None,
            counters: Arc::new(WsCounters::default()),
            close_grace: CLOSE_GRACE,
        })
    }

    /// Override the wait between sending the close frame and dropping the connection.
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Receive data frames on a bounded queue. Must be called before `connect()`.
    pub fn read_channel(&mut self, capacity: usize) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.read_tx = Some(tx);
        rx
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    pub fn stats(&self) -> WsStats {
        WsStats {
            read_count: self.counters.reads.load(Ordering::Relaxed),
            ping_count: self.counters.pings.load(Ordering::Relaxed),
            pong_count: self.counters.pongs.load(Ordering::Relaxed),
        }
    }

    /// Dial the target and start the reader task.
    pub async fn connect(&mut self) -> Result<(), CallError> {
        // reconnecting drops whatever is left of the previous connection
        self.sink = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let connector = match self.protocol {
            Protocol::Wss => Some(relaxed_tls_connector().map_err(|e| CallError::Web {
                target: self.addr.clone(),
                reason: e.to_string(),
            })?),
            _ => None,
        };

        let connecting = connect_async_tls_with_config(self.addr.as_str(), None, false, connector);

        let (ws_stream, _) = match timeout(CONNECT_TIMEOUT, connecting).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Websocket dial failed");
                return Err(CallError::Web {
                    target: self.addr.clone(),
                    reason: error_chain(&e),
                });
            }
            Err(_) => {
                return Err(CallError::Web {
                    target: self.addr.clone(),
                    reason: "websocket handshake timeout".to_string(),
                })
            }
        };

        let (sink, stream) = ws_stream.split();
        let (done_tx, done_rx) = watch::channel(false);
        let (pong_tx, pong_rx) = mpsc::channel(PONG_QUEUE_SIZE);

        let reader = tokio::spawn(read_loop(
            stream,
            done_rx,
            self.counters.clone(),
            pong_tx,
            self.read_tx.clone(),
        ));

        self.sink = Some(sink);
        self.reader = Some(reader);
        self.done_tx = Some(done_tx);
        self.pong_rx = Some(pong_rx);

        debug!(addr = %self.addr, "Websocket connected");
        Ok(())
    }

    /// Send a ping and wait briefly for the pong. A missing pong is not an error.
    pub async fn check_connection(&mut self) -> Result<(), CallError> {
        let addr = self.addr.clone();
        let sink = self.sink_mut()?;

        match timeout(PING_WRITE_TIMEOUT, sink.send(Message::Ping(PING_PAYLOAD.to_vec().into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(addr = %addr, error = %e, "Websocket ping failed");
                return Err(CallError::Web {
                    target: addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(CallError::Web {
                    target: addr,
                    reason: "ping write timeout".to_string(),
                })
            }
        }

        if let Some(pong_rx) = self.pong_rx.as_mut() {
            match timeout(PONG_WAIT, pong_rx.recv()).await {
                Ok(Some(data)) => {
                    debug!(addr = %addr, data = %String::from_utf8_lossy(&data), "Websocket pong")
                }
                _ => debug!(addr = %addr, "Websocket pong timeout"),
            }
        }

        Ok(())
    }

    pub async fn write_string(&mut self, data: &str) -> Result<(), CallError> {
        self.write(Message::Text(data.to_string().into())).await
    }

    pub async fn write_binary(&mut self, data: &[u8]) -> Result<(), CallError> {
        self.write(Message::Binary(data.to_vec().into())).await
    }

    async fn write(&mut self, message: Message) -> Result<(), CallError> {
        let addr = self.addr.clone();
        self.sink_mut()?.send(message).await.map_err(|e| {
            debug!(addr = %addr, error = %e, "Websocket write failed");
            CallError::Web {
                target: addr.clone(),
                reason: error_chain(&e),
            }
        })
    }

    /// Stop the reader, send a normal close frame, wait out the grace period and drop the connection.
    pub async fn disconnect(&mut self) -> Result<(), CallError> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };

        if let Some(done_tx) = self.done_tx.take() {
            let _ = done_tx.send(true);
        }

        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));

        let result = sink.send(close).await.map_err(|e| CallError::Web {
            target: self.addr.clone(),
            reason: e.to_string(),
        });

        tokio::time::sleep(self.close_grace).await;

        let _ = sink.close().await;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.pong_rx = None;

        debug!(addr = %self.addr, "Websocket disconnected");
        result
    }

    fn sink_mut(&mut self) -> Result<&mut SplitSink<WsStream, Message>, CallError> {
        let addr = &self.addr;
        self.sink.as_mut().ok_or_else(|| CallError::Other(format!("websocket {} not connected", addr)))
    }
}

fn relaxed_tls_connector() -> Result<Connector, native_tls::Error> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(Connector::NativeTls(connector))
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    mut done_rx: watch::Receiver<bool>,
    counters: Arc<WsCounters>,
    pong_tx: mpsc::Sender<Vec<u8>>,
    read_tx: Option<mpsc::Sender<WsMessage>>,
) {
    loop {
        let frame = tokio::select! {
            _ = done_rx.changed() => {
                debug!("Websocket reader done");
                return;
            }
            frame = stream.next() => frame,
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                // close 1000 (normal) ends up here too
                debug!(error = %e, "Websocket reader stopped");
                return;
            }
            None => return,
        };

        let received = match message {
            Message::Pong(data) => {
                counters.pongs.fetch_add(1, Ordering::Relaxed);
                let _ = pong_tx.try_send(data.to_vec());
                continue;
            }
            Message::Ping(_) => {
                // the protocol layer queues the pong reply
                counters.pings.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            Message::Text(text) => WsMessage {
                kind: WsMessageKind::Text,
                data: text.to_string().into_bytes(),
            },
            Message::Binary(data) => WsMessage {
                kind: WsMessageKind::Binary,
                data: data.to_vec(),
            },
            Message::Close(frame) => {
                debug!(frame = ?frame, "Websocket close frame received");
                continue;
            }
            Message::Frame(_) => continue,
        };

        counters.reads.fetch_add(1, Ordering::Relaxed);
        debug!(kind = ?received.kind, len = received.data.len(), "Websocket read");

        if let Some(tx) = &read_tx {
            if timeout(READ_POST_TIMEOUT, tx.send(received)).await.is_err() {
                debug!("Timed out posting websocket message");
            }
        }
    }
}
