//! Measures the latency of WebSocket connections phase by phase: DNS
//! lookup, TCP connect, TLS handshake, WebSocket upgrade, message round
//! trip, and close, with cumulative markers over the connection timeline.
//!
//! The canned flows ([`measure_latency`], [`measure_latency_json`],
//! [`measure_latency_ping`]) run a whole dial-exchange-close cycle with
//! default settings and return the finished [`TimingRecord`]. For finer
//! control, drive a [`WsSession`] step by step: it exposes the decomposed
//! write/read pair, pings, and surfaces partial timings after a failure.

mod config;
mod error;
mod resolve;
mod session;
mod timing;
mod tls;

pub use config::{ProbeConfig, TlsOptions};
pub use error::ProbeError;
pub use http::HeaderMap;
pub use session::{Endpoint, WsSession};
pub use timing::TimingRecord;
pub use tls::{CertificateSummary, TlsDetails};
pub use tokio_tungstenite::tungstenite::Message;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Connects to `url`, sends `message` as text, reads the response, and
/// closes the connection. Returns the finished timings and the response
/// bytes; on any step failure only the error is returned.
pub async fn measure_latency(
    url: &str,
    message: &str,
    headers: HeaderMap,
) -> Result<(TimingRecord, Vec<u8>), ProbeError> {
    let mut session = WsSession::default();
    session.dial(url, headers).await?;
    let response = session.send_and_receive(Message::text(message)).await?;
    if let Err(error) = session.close().await {
        debug!(%error, "close after round trip failed");
    }
    Ok((session.timings().clone(), response.into_data()))
}

/// Connects to `url`, sends `payload` as a JSON text message, decodes the
/// response, and closes the connection. Returns the finished timings and
/// the decoded response; on any step failure only the error is returned.
pub async fn measure_latency_json<T: Serialize>(
    url: &str,
    payload: &T,
    headers: HeaderMap,
) -> Result<(TimingRecord, Value), ProbeError> {
    let mut session = WsSession::default();
    session.dial(url, headers).await?;
    let response = session.send_json_and_receive(payload).await?;
    if let Err(error) = session.close().await {
        debug!(%error, "close after round trip failed");
    }
    Ok((session.timings().clone(), response))
}

/// Connects to `url`, measures a ping/pong round trip, and closes the
/// connection. Returns the finished timings; on any step failure only the
/// error is returned.
pub async fn measure_latency_ping(url: &str, headers: HeaderMap) -> Result<TimingRecord, ProbeError> {
    let mut session = WsSession::default();
    session.dial(url, headers).await?;
    session.ping().await?;
    if let Err(error) = session.close().await {
        debug!(%error, "close after ping failed");
    }
    Ok(session.timings().clone())
}
