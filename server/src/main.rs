use std::process::ExitCode;

use task_server::config::AppConfig;
use task_server::AppState;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let address = config.address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %address, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        %address,
        cache_revalidate_seconds = config.cache_revalidate_seconds,
        "listening"
    );

    let state = AppState::in_memory(config.cache_window());
    let server = axum::serve(listener, task_server::router(state))
        .with_graceful_shutdown(shutdown_signal());
    if let Err(error) = server.await {
        tracing::error!(%error, "server error");
        return ExitCode::FAILURE;
    }
    tracing::info!("server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("received ctrl-c, shutting down");
}
