//! Passport gateway.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                    PASSPORT GATEWAY                      │
//!                     │                                                          │
//!   GET /{user}/...   │  ┌────────┐   ┌─────────────┐   ┌──────────────────────┐ │
//!  ───────────────────┼─▶│  http  │──▶│ aggregation │──▶│ breaker (bookmarks)  │─┼──▶ bookmark-service
//!                     │  │ server │   │  join! +    │   ├──────────────────────┤ │
//!  ◀──────────────────┼──│        │◀──│ timeout_at  │──▶│ breaker (contacts)   │─┼──▶ contact-service
//!                     │  └────────┘   └─────────────┘   └──────────┬───────────┘ │
//!                     │                                           │             │
//!                     │                             load_balancer ▼ select      │
//!                     │                             ┌──────────────────────────┐ │
//!                     │   discovery refresher ─────▶│  instance registry       │ │
//!                     │   pings, call outcomes ────▶│  (arc-swap snapshots)    │ │
//!                     │                             └──────────────────────────┘ │
//!                     └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use passport_gateway::config::{load_config, GatewayConfig};
use passport_gateway::lifecycle::{signals, Gateway};
use passport_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(
    name = "passport-gateway",
    version,
    about = "Resilient bookmark/contact aggregation gateway"
)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_tracing(Some(&config.observability.log_level));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "passport-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config = ?args.config,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let gateway = Gateway::build(config)?;
    let running = gateway.start(listener, admin_listener, args.config).await?;
    tracing::info!(address = %running.local_addr, "Listening for connections");

    signals::spawn_signal_handler(running.shutdown_handle());
    running.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
