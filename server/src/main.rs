use anyhow::Result;
use docshield_server::{router, AppConfig, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr();
    info!(
        render_dpi = config.render_dpi,
        mode = ?config.redact_mode,
        rules = %config.rules_path.display(),
        "starting docshield server"
    );

    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("docshield server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
