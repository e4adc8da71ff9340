use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::resolve;
use crate::timing::TimingRecord;
use crate::tls;
use crate::tls::TlsDetails;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::header::ORIGIN;
use http::{HeaderMap, HeaderValue, Uri};
use pki_types::ServerName;
use serde::Serialize;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{client_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Descriptive metadata about the dialed endpoint. Never used for control
/// flow.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Every address the lookup returned; only the first one is dialed.
    pub addrs: Vec<IpAddr>,
    /// The headers actually sent with the upgrade request, caller headers
    /// merged over the protocol defaults.
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub tls: Option<TlsDetails>,
}

/// One instrumented attempt to open, use, and close a WebSocket connection.
///
/// A session owns exactly one connection and one [`TimingRecord`]. It cannot
/// be dialed twice; create a new session per connection attempt. After any
/// phase error the connection is unusable, but the record accumulated so far
/// stays readable through [`WsSession::timings`].
pub struct WsSession {
    config: ProbeConfig,
    timings: TimingRecord,
    endpoint: Option<Endpoint>,
    write: Option<WsSink>,
    read: Option<WsSource>,
}

impl WsSession {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            timings: TimingRecord::default(),
            endpoint: None,
            write: None,
            read: None,
        }
    }

    /// The timings accumulated so far. Fields of phases that have not run
    /// are zero.
    pub fn timings(&self) -> &TimingRecord {
        &self.timings
    }

    /// Metadata about the dialed endpoint, present once a dial has started.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Establishes the connection: name resolution, TCP connect, TLS
    /// handshake for `wss` targets, then the WebSocket upgrade, in that
    /// order, each phase timed as it completes.
    ///
    /// Records `dns_lookup`, `tcp_connect`, `tls_handshake`, `ws_handshake`
    /// and their cumulative markers. The upgrade duration is derived by
    /// subtracting the last transport marker from the total dial time rather
    /// than from a separate timer. A single attempt: the first resolved
    /// address is dialed, and any failure is returned as-is.
    pub async fn dial(&mut self, url: &str, headers: HeaderMap) -> Result<(), ProbeError> {
        if self.endpoint.is_some() {
            return Err(ProbeError::AlreadyConnected);
        }

        let uri: Uri = url
            .parse()
            .map_err(|_| ProbeError::InvalidTarget(url.to_string()))?;
        let secure = match uri.scheme_str() {
            Some("ws") => false,
            Some("wss") => true,
            _ => return Err(ProbeError::InvalidTarget(url.to_string())),
        };
        let host = uri
            .host()
            .ok_or_else(|| ProbeError::InvalidTarget(url.to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
        self.endpoint = Some(Endpoint {
            host: host.clone(),
            port,
            addrs: Vec::new(),
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            tls: None,
        });

        let started = Instant::now();

        let addrs = resolve::resolve(&host).await?;
        self.timings.dns_lookup = started.elapsed();
        self.timings.dns_lookup_done = self.timings.dns_lookup;
        let addr = SocketAddr::new(addrs[0], port);
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.addrs = addrs;
        }

        let tcp_start = Instant::now();
        let stream = timeout(self.config.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProbeError::ConnectTimeout(self.config.dial_timeout))?
            .map_err(ProbeError::Connect)?;
        self.timings.tcp_connect = tcp_start.elapsed();
        self.timings.tcp_connected = self.timings.dns_lookup_done + self.timings.tcp_connect;
        debug!(%addr, elapsed = ?self.timings.tcp_connect, "tcp connected");

        let stream = if secure {
            let tls_config = tls::client_config(&self.config.tls)?;
            let server_name = ServerName::try_from(host.clone())
                .map_err(|_| ProbeError::InvalidTarget(url.to_string()))?;
            let connector = TlsConnector::from(Arc::new(tls_config));
            let tls_start = Instant::now();
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(ProbeError::TlsHandshake)?;
            self.timings.tls_handshake = tls_start.elapsed();
            self.timings.tls_handshake_done =
                self.timings.tcp_connected + self.timings.tls_handshake;
            if let Some(endpoint) = self.endpoint.as_mut() {
                endpoint.tls = Some(tls::details(tls_stream.get_ref().1));
            }
            debug!(elapsed = ?self.timings.tls_handshake, "tls handshake complete");
            MaybeTlsStream::Rustls(tls_stream)
        } else {
            MaybeTlsStream::Plain(stream)
        };

        let mut request = uri.into_client_request().map_err(ProbeError::Handshake)?;
        for (name, value) in headers.iter() {
            request.headers_mut().insert(name, value.clone());
        }
        if !request.headers().contains_key(ORIGIN) {
            // Some servers refuse upgrades without an origin.
            if let Ok(value) = HeaderValue::from_str(&format!("http://{host}")) {
                request.headers_mut().insert(ORIGIN, value);
            }
        }
        let request_headers = request.headers().clone();
        let (ws, response) = client_async(request, stream)
            .await
            .map_err(ProbeError::Handshake)?;
        let dial_elapsed = started.elapsed();
        let upgrade_base = if secure {
            self.timings.tls_handshake_done
        } else {
            self.timings.tcp_connected
        };
        self.timings.ws_handshake = dial_elapsed - upgrade_base;
        self.timings.ws_handshake_done = dial_elapsed;
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.request_headers = request_headers;
            endpoint.response_headers = response.headers().clone();
        }
        debug!(elapsed = ?dial_elapsed, "websocket handshake complete");

        let (write, read) = ws.split();
        self.write = Some(write);
        self.read = Some(read);
        Ok(())
    }

    /// Sends a message and returns the write-start timestamp for a later
    /// [`WsSession::read_message`]. No timing field is recorded until the
    /// matching read completes.
    pub async fn write_message(&mut self, message: Message) -> Result<Instant, ProbeError> {
        let write = self.write.as_mut().ok_or(ProbeError::NotConnected)?;
        let start = Instant::now();
        write.send(message).await.map_err(ProbeError::Write)?;
        Ok(start)
    }

    /// Reads the next data message, bounded by the configured read deadline.
    ///
    /// Records `message_round_trip` as the wall time since `write_start` and
    /// `first_message_response` on top of the handshake marker. `write_start`
    /// must come from the [`WsSession::write_message`] call being answered;
    /// pairing it with an unrelated write yields a duration that is
    /// well-formed but meaningless.
    pub async fn read_message(&mut self, write_start: Instant) -> Result<Message, ProbeError> {
        let read = self.read.as_mut().ok_or(ProbeError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + self.config.read_timeout;
        loop {
            let frame = tokio::time::timeout_at(deadline, read.next())
                .await
                .map_err(|_| ProbeError::ReadTimeout(self.config.read_timeout))?;
            let message = match frame {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(ProbeError::Receive(error)),
                None => return Err(ProbeError::Receive(tungstenite::Error::ConnectionClosed)),
            };
            match message {
                Message::Text(_) | Message::Binary(_) => {
                    self.timings.message_round_trip = write_start.elapsed();
                    self.timings.first_message_response =
                        self.timings.ws_handshake_done + self.timings.message_round_trip;
                    return Ok(message);
                }
                // Control frames are not the response being timed.
                _ => continue,
            }
        }
    }

    /// Sends a message and waits for the response, measuring the round trip.
    ///
    /// Records `message_round_trip` and `first_message_response`.
    pub async fn send_and_receive(&mut self, message: Message) -> Result<Message, ProbeError> {
        let start = self.write_message(message).await?;
        let response = self.read_message(start).await?;
        debug!(len = response.len(), "received response");
        Ok(response)
    }

    /// Sends `payload` as a JSON text message and decodes the response.
    ///
    /// Records `message_round_trip` and `first_message_response`.
    pub async fn send_json_and_receive<T: Serialize>(
        &mut self,
        payload: &T,
    ) -> Result<Value, ProbeError> {
        let text = serde_json::to_string(payload)?;
        let response = self.send_and_receive(Message::text(text)).await?;
        Ok(serde_json::from_slice(&response.into_data())?)
    }

    /// Sends a ping and waits for the pong, measuring the control-frame
    /// round trip.
    ///
    /// Pong arrival is only observable by reading frames, so the read half
    /// moves into a background task that pumps the stream until the
    /// connection errors or closes; the task may outlive this call. The
    /// session can no longer read data messages afterwards, and only one
    /// ping per session is supported.
    ///
    /// Records `message_round_trip` and `first_message_response`.
    pub async fn ping(&mut self) -> Result<(), ProbeError> {
        let write = self.write.as_mut().ok_or(ProbeError::NotConnected)?;
        let read = self.read.take().ok_or(ProbeError::NotConnected)?;

        let (pong_tx, pong_rx) = oneshot::channel();
        tokio::spawn(pump_frames(read, pong_tx));

        let start = Instant::now();
        write
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(ProbeError::Write)?;

        match timeout(self.config.pong_timeout, pong_rx).await {
            Ok(Ok(())) => {
                self.timings.message_round_trip = start.elapsed();
                self.timings.first_message_response =
                    self.timings.ws_handshake_done + self.timings.message_round_trip;
                Ok(())
            }
            // The pump dropped the sender: the read side failed before a
            // pong arrived.
            Ok(Err(_)) => Err(ProbeError::Receive(tungstenite::Error::ConnectionClosed)),
            Err(_) => Err(ProbeError::PongTimeout(self.config.pong_timeout)),
        }
    }

    /// Closes the connection: a best-effort close handshake followed by
    /// shutting the sink down.
    ///
    /// Records `connection_close` even when a step fails part-way, and sets
    /// `total` only if a message exchange happened; otherwise `total` stays
    /// zero.
    pub async fn close(&mut self) -> Result<(), ProbeError> {
        let mut write = self.write.take().ok_or(ProbeError::NotConnected)?;
        let start = Instant::now();
        let result = async {
            write.send(Message::Close(None)).await?;
            write.close().await
        }
        .await
        .map_err(ProbeError::Close);
        drop(self.read.take());
        self.timings.connection_close = start.elapsed();
        if !self.timings.first_message_response.is_zero() {
            self.timings.total =
                self.timings.first_message_response + self.timings.connection_close;
        }
        debug!(elapsed = ?self.timings.connection_close, "connection closed");
        result
    }
}

impl Default for WsSession {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

/// Drains frames so control-frame delivery can be observed, signalling the
/// first pong. Ends when the connection errors or closes.
async fn pump_frames(mut read: WsSource, pong_tx: oneshot::Sender<()>) {
    let mut pong_tx = Some(pong_tx);
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Pong(_)) => {
                if let Some(tx) = pong_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(_) => {}
            Err(error) => {
                debug!(%error, "frame pump stopped");
                break;
            }
        }
    }
}
