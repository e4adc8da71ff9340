use anyhow::anyhow;
use clap::Parser;
use http::header::{HeaderName, HeaderValue};
use std::str::FromStr;
use tracing::Level;
use wsprobe::{HeaderMap, Message, ProbeConfig, TlsOptions, WsSession};

#[derive(Parser)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The request url,like wss://echo.websocket.org
    url: String,
    /// The message to send in the round trip.
    #[arg(short = 'd', long, default_value = "Hello, WebSocket!")]
    message: String,
    /// Send the message as JSON and decode the response.
    #[arg(short = 'j', long)]
    json: bool,
    /// Measure a ping/pong round trip instead of a message.
    #[arg(short = 'p', long)]
    ping: bool,
    /// The websocket headers.
    #[arg(short = 'H', long)]
    headers: Vec<String>,
    /// The pem path.
    #[arg(short = 'c', long)]
    certificate_path_option: Option<String>,
    /// Skip certificate validation.
    #[arg(short = 'k', long)]
    skip_certificate_validate: bool,
    /// The debug switch.
    #[arg(short = 'v', long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli: Cli = Cli::parse();
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_level(true)
        .with_max_level(log_level)
        .init();
    if let Err(e) = run(cli).await {
        println!("{}", e);
    }
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let mut headers = HeaderMap::new();
    for x in &cli.headers {
        let split: Vec<String> = x.splitn(2, ':').map(|s| s.trim().to_string()).collect();
        if split.len() == 2 {
            headers.insert(
                HeaderName::from_str(split[0].as_str())?,
                HeaderValue::from_str(split[1].as_str())?,
            );
        } else {
            return Err(anyhow!("header error"));
        }
    }

    let config = ProbeConfig {
        tls: TlsOptions {
            ca_certificates: cli.certificate_path_option.clone().map(Into::into),
            insecure_skip_verify: cli.skip_certificate_validate,
        },
        ..ProbeConfig::default()
    };

    let mut session = WsSession::new(config);
    session.dial(&cli.url, headers).await?;
    if cli.ping {
        session.ping().await?;
    } else if cli.json {
        let payload: serde_json::Value = serde_json::from_str(&cli.message)
            .map_err(|_| anyhow!("-d must be valid json with --json"))?;
        let response = session.send_json_and_receive(&payload).await?;
        println!("Response: {}", response);
    } else {
        let response = session
            .send_and_receive(Message::text(cli.message.clone()))
            .await?;
        println!("Response: {}", String::from_utf8_lossy(&response.into_data()));
    }
    session.close().await?;

    if cli.debug {
        if let Some(endpoint) = session.endpoint() {
            println!("IP: {:?}", endpoint.addrs);
            for (key, value) in endpoint.request_headers.iter() {
                println!("> {}: {}", key, value.to_str()?);
            }
            for (key, value) in endpoint.response_headers.iter() {
                println!("< {}: {}", key, value.to_str()?);
            }
            if let Some(tls) = &endpoint.tls {
                print!("{}", tls);
            }
        }
    }
    println!("{}", session.timings());
    Ok(())
}
