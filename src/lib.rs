pub mod adapters;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod places;
pub mod ports;
pub mod state;
pub mod store;
pub mod types;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins; otherwise everything at `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

pub async fn serve(config: config::AppConfig) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.bind, config.port);
    info!(
        environment = %config.environment,
        storage = config.storage_name(),
        "starting server"
    );
    let store = store::open(&config.storage, config.environment).await;
    let router = app::app(state::AppState::new(config, store));

    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
