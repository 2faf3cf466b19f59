//! netws - line-oriented WebSocket client.
//!
//! Connects to a WebSocket endpoint, prints every text message it receives
//! and sends each line read from stdin as a text frame. The connection is
//! closed when stdin ends.
//!
//! ```text
//! $ netws ws://localhost:9001/
//! Connected
//! hello
//! Sent: "hello"
//! hello
//! ```

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use netws_client::{
    CLOSE_NORMAL, CloseInfo, CloseOrigin, KeyScheme, MessageHandler, WebSocketClientBuilder,
    WebSocketError,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

mod error;

use error::CliResult;

/// Line-oriented WebSocket client
#[derive(Parser, Debug)]
#[command(name = "netws")]
#[command(version)]
#[command(about = "Send stdin lines over a WebSocket and print what comes back")]
struct Cli {
    /// WebSocket URL (ws://HOST:PORT/PATH)
    url: String,

    /// Dump raw wire bytes to the log
    #[arg(short, long, env = "NETWS_DEBUG")]
    debug: bool,

    /// Send frames unmasked
    #[arg(long)]
    no_mask: bool,

    /// Use the legacy space/noise handshake key
    #[arg(long)]
    legacy_key: bool,

    /// Connect and handshake timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Prints delivered messages to stdout.
struct StdoutHandler;

#[async_trait]
impl MessageHandler for StdoutHandler {
    async fn on_message(&self, message: String) {
        println!("{message}");
    }

    async fn on_close(&self, info: &CloseInfo) {
        tracing::info!(code = info.code, "Server closed the connection");
    }

    async fn on_end_of_stream(&self) {
        tracing::info!("Server went away");
    }

    async fn on_error(&self, error: &WebSocketError) {
        tracing::error!(error = %error, "Receive failed");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat, debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_directive = if debug { "netws=debug" } else { "netws=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn client_builder(cli: &Cli) -> WebSocketClientBuilder {
    let key_scheme = if cli.legacy_key {
        KeyScheme::Legacy
    } else {
        KeyScheme::Rfc6455
    };

    WebSocketClientBuilder::new()
        .url(cli.url.as_str())
        .debug(cli.debug)
        .mask_outbound(!cli.no_mask)
        .key_scheme(key_scheme)
        .connect_timeout(Duration::from_secs(cli.timeout))
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut ws = client_builder(&cli).connect_with_handler(StdoutHandler).await?;
    println!("Connected");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        ws.send(&line).await?;
        println!("Sent: {line:?}");
    }

    println!("closing connection...");
    ws.close(CLOSE_NORMAL, "", CloseOrigin::Local).await?;
    Ok(())
}
