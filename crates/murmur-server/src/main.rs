use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use murmur_hub::{Hub, HubConfig, HubHandle};
use murmur_server::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "murmur-server", about = "WebSocket broadcast chat server", version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "MURMUR_ADDR", default_value = "0.0.0.0:80")]
    addr: SocketAddr,

    /// Page served at `/`.
    #[arg(long, env = "MURMUR_INDEX", default_value = "index.html")]
    index: PathBuf,

    /// Largest message accepted from a client, in bytes.
    #[arg(long, default_value_t = murmur_hub::MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Per-peer outbound queue capacity.
    #[arg(long, default_value_t = murmur_hub::OUTBOUND_CAPACITY)]
    queue_capacity: usize,

    /// Do not broadcast a notice when a peer joins.
    #[arg(long)]
    no_announce: bool,

    /// Seconds between statistics log lines (0 disables).
    #[arg(long, default_value = "60")]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let hub = Hub::spawn(
        HubConfig::new()
            .max_message_size(cli.max_message_size)
            .outbound_capacity(cli.queue_capacity)
            .announce_joins(!cli.no_announce),
    )?;

    let server = Server::bind(
        ServerConfig::new(cli.addr)
            .index(cli.index)
            .max_message_size(cli.max_message_size),
        hub.clone(),
    )
    .await?;

    if cli.stats_interval > 0 {
        tokio::spawn(report_stats(hub.clone(), Duration::from_secs(cli.stats_interval)));
    }

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    hub.shutdown().await;
    tracing::info!(stats = %stats_json(&hub), "hub stopped");
    Ok(())
}

async fn report_stats(hub: HubHandle, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if hub.is_closed() {
            break;
        }
        tracing::info!(stats = %stats_json(&hub), "hub stats");
    }
}

fn stats_json(hub: &HubHandle) -> String {
    serde_json::to_string(&hub.metrics()).unwrap_or_default()
}
