use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Durations of each phase of a WebSocket connection, plus cumulative
/// durations over the connection timeline.
///
/// A zero duration means the phase never ran: fields are only written when
/// their phase completes without error, so after a failure every later field
/// stays at zero. Cumulative markers are always computed by adding the phase
/// duration to the preceding marker, never from a second timer.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TimingRecord {
    /// Time to resolve the target host.
    pub dns_lookup: Duration,
    /// Time to establish the TCP connection.
    pub tcp_connect: Duration,
    /// Time to perform the TLS handshake, zero for `ws://` targets.
    pub tls_handshake: Duration,
    /// Time to perform the WebSocket upgrade handshake.
    pub ws_handshake: Duration,
    /// Time from sending a message to receiving its response.
    pub message_round_trip: Duration,
    /// Time to close the connection.
    pub connection_close: Duration,

    /// Elapsed at DNS resolution.
    pub dns_lookup_done: Duration,
    /// Elapsed once the TCP connection is established.
    pub tcp_connected: Duration,
    /// Elapsed once the TLS handshake is completed.
    pub tls_handshake_done: Duration,
    /// Elapsed once the WebSocket upgrade is completed.
    pub ws_handshake_done: Duration,
    /// Elapsed once the first message response is received.
    pub first_message_response: Duration,
    /// Total time from opening to closing the connection. Stays zero when no
    /// message exchange happened, even if the close itself was measured.
    pub total: Duration,
}

impl fmt::Display for TimingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time breakdown:")?;
        writeln!(f, "  DNS lookup:       {:>6} ms", self.dns_lookup.as_millis())?;
        writeln!(f, "  TCP connect:      {:>6} ms", self.tcp_connect.as_millis())?;
        writeln!(f, "  TLS handshake:    {:>6} ms", self.tls_handshake.as_millis())?;
        writeln!(f, "  WS handshake:     {:>6} ms", self.ws_handshake.as_millis())?;
        writeln!(
            f,
            "  Msg round trip:   {:>6} ms",
            self.message_round_trip.as_millis()
        )?;
        if self.connection_close.is_zero() {
            writeln!(f, "  Close time:       {:>6} ms", "-")?;
        } else {
            writeln!(
                f,
                "  Close time:       {:>6} ms",
                self.connection_close.as_millis()
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Cumulative:")?;
        writeln!(
            f,
            "  DNS lookup done:  {:>6} ms",
            self.dns_lookup_done.as_millis()
        )?;
        writeln!(
            f,
            "  TCP connected:    {:>6} ms",
            self.tcp_connected.as_millis()
        )?;
        writeln!(
            f,
            "  TLS done:         {:>6} ms",
            self.tls_handshake_done.as_millis()
        )?;
        writeln!(
            f,
            "  WS done:          {:>6} ms",
            self.ws_handshake_done.as_millis()
        )?;
        writeln!(
            f,
            "  First response:   {:>6} ms",
            self.first_message_response.as_millis()
        )?;
        if self.total.is_zero() {
            writeln!(f, "  Total:            {:>6} ms", "-")?;
        } else {
            writeln!(f, "  Total:            {:>6} ms", self.total.as_millis())?;
        }
        Ok(())
    }
}
