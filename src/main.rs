use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use captcha_relay::config::Config;
use captcha_relay::routes::build_router;
use captcha_relay::state::AppState;
use captcha_relay::telemetry;

/// Periodic housekeeping: drop tasks nobody can still be polling.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let started = std::time::Instant::now();
  let config = Config::from_env();
  let public_url = config.public_base();

  // Build shared application state (task store, notifier, push channel).
  let state = Arc::new(AppState::new(config));

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
  let listener = TcpListener::bind(addr).await?;
  info!(target: "relay_backend", %addr, %public_url, "Captcha relay listening");

  // Housekeeping loop; dies with the process.
  let cleanup_state = state.clone();
  tokio::spawn(async move {
    let mut ticks = tokio::time::interval(CLEANUP_INTERVAL);
    loop {
      ticks.tick().await;
      cleanup_state.store.cleanup_expired().await;
    }
  });

  if let Some(notifier) = state.notifier.clone() {
    let startup_secs = started.elapsed().as_secs();
    tokio::spawn(async move {
      notifier.notify_startup(&public_url, startup_secs).await;
    });
  }

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "relay_backend", "Shutdown complete");
  Ok(())
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!(target: "relay_backend", "Ctrl-C received; shutting down"),
    Err(e) => {
      warn!(target: "relay_backend", error = %e, "Failed to install Ctrl-C handler");
      std::future::pending::<()>().await;
    }
  }
}
