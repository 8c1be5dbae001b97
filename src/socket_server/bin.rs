//! SafeChat Daemon Binary
//!
//! A WebSocket server that relays presence, direct messages, typing
//! signals and proximity alerts between connected clients.
//!
//! # Usage
//!
//! ```bash
//! safechat-daemon --port 5000
//! safechat-daemon --port 5000 --host 127.0.0.1 --threshold-km 1.0
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use safechat_engine::engine::{Engine, EngineConfig};
use safechat_engine::proximity::UnresolvedDirectory;
use safechat_engine::socket_server::handle_connection;
use safechat_engine::store::{MemoryAlertStore, MemoryMessageStore, MemoryUserStore};

/// SafeChat presence and proximity daemon
#[derive(Parser, Debug)]
#[command(name = "safechat-daemon")]
#[command(about = "SafeChat presence, messaging and proximity-alert daemon")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "SAFECHAT_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "SAFECHAT_HOST")]
    host: String,

    /// Proximity alert threshold in kilometers
    #[arg(long, default_value = "1.0")]
    threshold_km: f64,

    /// Suppression window for identical repeat alerts, in seconds (0 disables)
    #[arg(long, default_value = "60")]
    alert_cooldown_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("safechat_engine=info".parse().unwrap())
                .add_directive("safechat_daemon=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let config = EngineConfig {
        threshold_km: args.threshold_km,
        alert_cooldown: Duration::from_secs(args.alert_cooldown_secs),
        ..EngineConfig::default()
    };

    // In-memory stores by default; a database-backed deployment swaps in
    // its own implementations. The phone directory resolver is the
    // always-absent default until relatives register with the app.
    let engine = Engine::new(
        config,
        MemoryUserStore::new(),
        MemoryAlertStore::new(),
        MemoryMessageStore::new(),
        Arc::new(UnresolvedDirectory),
    );

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("SafeChat daemon listening on ws://{}", addr);
    tracing::info!(
        "Proximity threshold {} km, alert cooldown {}s",
        args.threshold_km,
        args.alert_cooldown_secs
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::info!("Accepted connection from {}", addr);
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    handle_connection(stream, engine).await;
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}
