use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors from one phase of the connection lifecycle.
///
/// Each variant maps to the phase that failed; nothing here retries, the
/// error from the failing step is returned as-is with phase context. After
/// any error the session's connection is unusable and every timing field of
/// a later phase stays zero.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    #[error("dns lookup failed")]
    Resolution(#[source] hickory_resolver::ResolveError),

    #[error("dns lookup for {0} returned no addresses")]
    NoAddresses(String),

    #[error("tcp connect failed")]
    Connect(#[source] std::io::Error),

    #[error("tcp connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("failed to read ca certificates")]
    CaCertificates(#[source] std::io::Error),

    #[error("tls configuration failed")]
    Tls(#[source] rustls::Error),

    #[error("tls handshake failed")]
    TlsHandshake(#[source] std::io::Error),

    #[error("websocket handshake failed")]
    Handshake(#[source] tungstenite::Error),

    #[error("failed to write message")]
    Write(#[source] tungstenite::Error),

    #[error("failed to read message")]
    Receive(#[source] tungstenite::Error),

    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("pong response timed out after {0:?}")]
    PongTimeout(Duration),

    #[error("failed to close connection")]
    Close(#[source] tungstenite::Error),

    #[error("message could not be encoded or decoded")]
    Json(#[from] serde_json::Error),

    #[error("session has no open connection")]
    NotConnected,

    #[error("session already dialed; create a new session per connection")]
    AlreadyConnected,
}
