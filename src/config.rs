use std::path::PathBuf;
use std::time::Duration;

/// Per-session configuration. Passed to [`crate::WsSession::new`], so two
/// sessions never share mutable settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Bound on the TCP connect step.
    pub dial_timeout: Duration,
    /// Deadline for each message read.
    pub read_timeout: Duration,
    /// How long to wait for a pong after sending a ping.
    pub pong_timeout: Duration,
    /// Secure-transport settings for `wss://` targets.
    pub tls: TlsOptions,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(5),
            tls: TlsOptions::default(),
        }
    }
}

/// TLS settings. The default verifies against the webpki root store.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle to use as the root store instead of the webpki roots.
    pub ca_certificates: Option<PathBuf>,
    /// Skip certificate validation.
    pub insecure_skip_verify: bool,
}
