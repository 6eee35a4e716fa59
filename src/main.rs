//! State Log Server - Binary Entry Point
//!
//! Local ingest server: appends events to day-partitioned files (or SQLite
//! when `DATABASE_URL` is set) and serves the latest state per key.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use state_log::api::{self, AppState, TelegramSink};
use state_log::config::{parse_port, ServerConfig};
use state_log::event_store::open_store;
use state_log::types::AppResult;

const HELP: &str = "\
state-log-server - local ingest server for state transition logs

Usage:
  state-log-server [--port <number>] [--help]

Options:
  --port <number>   Port for local server (default: 8787)
  -h, --help        Show this help message

Environment variables:
  STATE_LOG_SERVER_PORT   Default port when --port is not provided
  STATE_LOG_READ_DAYS     Days of partitions scanned by GET /states (default: 3)
  STATE_LOG_DIR           Partition directory (default: ./.log-values)
  DATABASE_URL            Store events in SQLite instead (sqlite://path)
  TELEGRAM_BOT_TOKEN      Bot token for error alerts
  TELEGRAM_GROUP_ID       Chat receiving error alerts
  TELEGRAM_TOPIC_ID       Optional forum topic for error alerts
  RUST_LOG                Log filter (default: state_log=info,tower_http=info)

Behavior:
  - Writes logs to <STATE_LOG_DIR>/backend-YYYY-MM-DD.log
  - Exposes POST /ingest, GET /states and GET /health
";

/// `--port <n>` from the command line; invalid values are ignored
fn port_arg(args: &[String]) -> Option<u16> {
    let i = args.iter().position(|arg| arg == "--port")?;
    args.get(i + 1).and_then(|raw| parse_port(raw))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print!("{HELP}");
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "state_log=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(port) = port_arg(&args) {
        config = config.with_port(port);
    }

    let store = open_store(&config).await?;
    let mut state = AppState::new(store);
    if let Some(telegram) = config.telegram.clone() {
        tracing::info!(group_id = telegram.group_id, "error alerts enabled");
        state = state.with_alert_sink(Arc::new(TelegramSink::new(telegram)));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    api::serve(listener, Arc::new(state)).await?;
    Ok(())
}
