use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tlogd::config::{AppConfig, FileConfig};
use tlogd::routes::router;
use tlogd::state;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;
    let file = FileConfig::load(&cfg.config_path)?;

    let app_state = Arc::new(state::build(&cfg, &file)?);
    if app_state.submit_secret.is_none() {
        info!("tlogd: submit disabled (no TLOGD_SUBMIT_SECRET)");
    }

    // Heads are refreshed in the background; the first tick fires immediately.
    app_state.sths().start(file.cache.refresh());

    let app = router(app_state.clone());

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("tlogd listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    app_state.sths().stop_all().await;
    info!("tlogd: stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("tlogd: failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("tlogd: shutting down");
}
