use clap::Parser;
use leveler_simulator::{SimState, serve, status_task};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bench simulator for the leveling controller", long_about = None)]
struct Args {
    /// Address to serve the WebSocket endpoint on
    #[arg(long, env = "LEVELER_SIM_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Status frame period (ms)
    #[arg(long, env = "LEVELER_SIM_TICK_MS", default_value_t = 100)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LEVELER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(SimState::default());
    tokio::spawn(status_task(
        state.clone(),
        Duration::from_millis(args.tick_ms.max(1)),
    ));

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("simulator listening on ws://{}/ws", listener.local_addr()?);
    serve(listener, state).await?;
    Ok(())
}
