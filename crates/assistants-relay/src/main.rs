use assistants_relay::{RelayConfig, router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,assistants_relay=debug,assistants_ox=debug".into()),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let config = RelayConfig::parse();
    config.validate()?;

    let app = router(&config)?;
    let listener = TcpListener::bind(config.bind).await?;

    info!(
        addr = %config.bind,
        route = %config.route,
        format = ?config.stream_format,
        "assistants relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("assistants relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
