mod config;
mod error;
mod mime;
mod server;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::AppError;
use server::SiteState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting rulebook site server");

    let config = Config::from_env()?;
    info!(
        port = config.port,
        site_dir = %config.site_dir.display(),
        snapshot = %config.snapshot_path.display(),
        "configuration loaded"
    );
    if !config.snapshot_path.is_file() {
        info!("snapshot not built yet, guide API will return 404 until rulebook-build runs");
    }

    let app = server::router(SiteState {
        root: config.site_dir.clone(),
        snapshot_path: config.snapshot_path.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;
    info!(listen_addr = %addr, "serving site");

    axum::serve(listener, app).await?;
    info!("server shut down");
    Ok(())
}
