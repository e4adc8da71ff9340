mod common;

use common::{MockWsServer, ServerBehavior};
use serde::Serialize;
use std::time::{Duration, Instant};
use wsprobe::{
    measure_latency, measure_latency_json, measure_latency_ping, HeaderMap, Message, ProbeConfig,
    ProbeError, TimingRecord, WsSession,
};

#[derive(Serialize)]
struct Greeting {
    text: String,
}

fn assert_dial_markers(t: &TimingRecord) {
    assert_eq!(t.dns_lookup_done, t.dns_lookup);
    assert_eq!(t.tcp_connected, t.dns_lookup_done + t.tcp_connect);
    assert!(t.tls_handshake.is_zero());
    assert!(t.tls_handshake_done.is_zero());
    assert_eq!(t.ws_handshake_done, t.tcp_connected + t.ws_handshake);
    assert!(!t.ws_handshake_done.is_zero());
}

#[tokio::test]
async fn measure_latency_echoes_payload() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let msg = "Hello, world!";

    let (timings, response) = measure_latency(&server.ws_url(), msg, HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(response, msg.as_bytes());
    assert!(!timings.message_round_trip.is_zero());
    assert_eq!(
        timings.first_message_response,
        timings.ws_handshake_done + timings.message_round_trip
    );
    assert_eq!(
        timings.total,
        timings.first_message_response + timings.connection_close
    );
    assert!(!timings.total.is_zero());
    assert_dial_markers(&timings);
}

#[tokio::test]
async fn measure_latency_json_decodes_response() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let payload = Greeting {
        text: "Hello, world!".to_string(),
    };

    let (timings, response) = measure_latency_json(&server.ws_url(), &payload, HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(response["text"], "Hello, world!");
    assert!(!timings.message_round_trip.is_zero());
    assert!(!timings.total.is_zero());
}

#[tokio::test]
async fn measure_latency_ping_times_the_pong() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;

    let timings = measure_latency_ping(&server.ws_url(), HeaderMap::new())
        .await
        .unwrap();

    assert!(!timings.message_round_trip.is_zero());
    assert!(!timings.first_message_response.is_zero());
    assert_eq!(
        timings.first_message_response,
        timings.ws_handshake_done + timings.message_round_trip
    );
    assert!(!timings.total.is_zero());
}

#[tokio::test]
async fn decomposed_read_measures_wall_time_since_write() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let mut session = WsSession::default();
    session.dial(&server.ws_url(), HeaderMap::new()).await.unwrap();

    let start = session
        .write_message(Message::text("Hello, world!"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let response = session.read_message(start).await.unwrap();

    assert_eq!(response.into_data(), b"Hello, world!");
    // The round trip spans both calls, not just the read.
    assert!(session.timings().message_round_trip >= Duration::from_millis(150));
    session.close().await.unwrap();
}

#[tokio::test]
async fn close_without_exchange_keeps_total_zero() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let mut session = WsSession::default();
    session.dial(&server.ws_url(), HeaderMap::new()).await.unwrap();

    session.close().await.unwrap();

    let t = session.timings();
    assert!(t.message_round_trip.is_zero());
    assert!(t.first_message_response.is_zero());
    assert!(t.total.is_zero());
}

#[tokio::test]
async fn ping_against_silent_peer_times_out() {
    let server = MockWsServer::start(ServerBehavior::Silent).await;
    let config = ProbeConfig {
        pong_timeout: Duration::from_millis(300),
        ..ProbeConfig::default()
    };
    let mut session = WsSession::new(config);
    session.dial(&server.ws_url(), HeaderMap::new()).await.unwrap();

    let started = Instant::now();
    let err = session.ping().await.unwrap_err();
    let waited = started.elapsed();

    assert!(matches!(err, ProbeError::PongTimeout(_)));
    assert!(waited >= Duration::from_millis(300));
    assert!(waited < Duration::from_millis(1500));

    let t = session.timings();
    assert!(!t.ws_handshake_done.is_zero());
    assert!(t.message_round_trip.is_zero());
    assert!(t.first_message_response.is_zero());
    assert!(t.total.is_zero());
}

#[tokio::test]
async fn connect_failure_leaves_later_markers_zero() {
    // Bind and drop a listener to get a port nothing is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = WsSession::default();
    let err = session
        .dial(&format!("ws://{addr}"), HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProbeError::Connect(_) | ProbeError::ConnectTimeout(_)
    ));
    let t = session.timings();
    assert!(t.tcp_connect.is_zero());
    assert!(t.tcp_connected.is_zero());
    assert!(t.ws_handshake_done.is_zero());
    assert!(t.first_message_response.is_zero());
    assert!(t.total.is_zero());
}

#[tokio::test]
async fn rejected_upgrade_fails_the_session() {
    let server = MockWsServer::start(ServerBehavior::RejectUpgrade).await;
    let mut session = WsSession::default();

    let err = session
        .dial(&server.ws_url(), HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Handshake(_)));
    let t = session.timings();
    assert!(!t.tcp_connected.is_zero());
    assert!(t.ws_handshake.is_zero());
    assert!(t.ws_handshake_done.is_zero());
}

#[tokio::test]
async fn operations_require_a_dialed_session() {
    let mut session = WsSession::default();
    assert!(matches!(
        session.send_and_receive(Message::text("hi")).await,
        Err(ProbeError::NotConnected)
    ));
    assert!(matches!(session.ping().await, Err(ProbeError::NotConnected)));
    assert!(matches!(session.close().await, Err(ProbeError::NotConnected)));
}

#[tokio::test]
async fn session_cannot_dial_twice() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let mut session = WsSession::default();
    session.dial(&server.ws_url(), HeaderMap::new()).await.unwrap();

    let err = session
        .dial(&server.ws_url(), HeaderMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::AlreadyConnected));
    session.close().await.unwrap();
}

#[tokio::test]
async fn dial_captures_endpoint_metadata() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let mut session = WsSession::default();
    session.dial(&server.ws_url(), HeaderMap::new()).await.unwrap();

    let endpoint = session.endpoint().unwrap();
    assert_eq!(endpoint.host, "127.0.0.1");
    assert_eq!(endpoint.port, server.addr.port());
    assert_eq!(endpoint.addrs, vec![server.addr.ip()]);
    assert!(endpoint.request_headers.contains_key("sec-websocket-key"));
    assert_eq!(
        endpoint
            .request_headers
            .get("upgrade")
            .unwrap()
            .to_str()
            .unwrap(),
        "websocket"
    );
    assert!(endpoint.request_headers.contains_key("origin"));
    assert!(endpoint.response_headers.contains_key("sec-websocket-accept"));
    assert!(endpoint.tls.is_none());
    session.close().await.unwrap();
}

#[tokio::test]
async fn caller_headers_reach_the_upgrade_request() {
    let server = MockWsServer::start(ServerBehavior::Echo).await;
    let mut headers = HeaderMap::new();
    headers.insert("x-probe-run", "42".parse().unwrap());
    let mut session = WsSession::default();
    session.dial(&server.ws_url(), headers).await.unwrap();

    let endpoint = session.endpoint().unwrap();
    assert_eq!(
        endpoint
            .request_headers
            .get("x-probe-run")
            .unwrap()
            .to_str()
            .unwrap(),
        "42"
    );
    session.close().await.unwrap();
}
