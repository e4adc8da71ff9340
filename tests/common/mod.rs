//! Shared test utilities: an in-process WebSocket server with scriptable
//! behavior.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// How the mock server treats clients after accepting the TCP connection.
#[derive(Debug, Clone, Copy)]
pub enum ServerBehavior {
    /// Complete the upgrade, echo data messages, answer pings with pongs.
    Echo,
    /// Complete the upgrade, then never read or write another frame.
    Silent,
    /// Refuse the upgrade with a plain 404 response.
    RejectUpgrade,
}

/// A mock WebSocket server bound to an ephemeral local port.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    pub async fn start(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, behavior).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: TcpStream, behavior: ServerBehavior) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        if let ServerBehavior::RejectUpgrade = behavior {
            let mut stream = stream;
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n")
                .await;
            return;
        }

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        if let ServerBehavior::Silent = behavior {
            // Hold the connection open without ever processing a frame.
            std::future::pending::<()>().await;
        }

        let (mut write, mut read) = ws_stream.split();
        while let Some(msg) = read.next().await {
            match msg {
                Ok(msg) if msg.is_text() || msg.is_binary() => {
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
                Ok(msg) if msg.is_ping() => {
                    let pong = Message::Pong(msg.into_data());
                    if write.send(pong).await.is_err() {
                        break;
                    }
                }
                Ok(msg) if msg.is_close() => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }

    /// The WebSocket URL for this server.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}
