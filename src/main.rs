use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod observer;
mod protocol;
mod relay;

use crate::config::AppConfig;
use crate::observer::ConsoleObserver;
use crate::protocol::session::SessionState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream MySQL host (overrides the config file)
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream MySQL port (overrides the config file)
    #[arg(long)]
    upstream_port: Option<u16>,

    /// Path to configuration file
    #[arg(long, default_value = "tap.yaml")]
    config: String,

    /// Dump every payload as hex
    #[arg(long)]
    hex_dump: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mysql_tap=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        let config = AppConfig::load(&args.config)?;
        info!("Loaded configuration from {}", args.config);
        config
    } else {
        info!("No config file at {}, using defaults", args.config);
        AppConfig::default()
    };

    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(host) = args.upstream_host {
        config.upstream_host = host;
    }
    if let Some(port) = args.upstream_port {
        config.upstream_port = port;
    }
    if args.hex_dump {
        config.hex_dump = true;
    }

    info!("Tap listening on port {}", config.listen_port);
    info!(
        "Forwarding to upstream at {}:{}",
        config.upstream_host, config.upstream_port
    );

    let listener =
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.listen_port)).await?;

    // One relay session at a time; the decoder serves exactly one
    // client-server pair.
    loop {
        let (client_socket, client_addr) = listener.accept().await?;
        info!("Client connected from {}", client_addr);

        let upstream = match tokio::net::TcpStream::connect(format!(
            "{}:{}",
            config.upstream_host, config.upstream_port
        ))
        .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                error!("Failed to reach upstream: {}", e);
                continue;
            }
        };
        info!("Connected to upstream MySQL server");

        let state = SessionState::new(config.max_columns);
        let mut observer = ConsoleObserver::new(config.hex_dump);
        match relay::run_session(client_socket, upstream, state, &mut observer).await {
            Ok(summary) => info!(
                packets = summary.packets,
                "Session ended, {} disconnected", summary.disconnected_by
            ),
            Err(e) => error!("Session error: {:#}", e),
        }
    }
}
