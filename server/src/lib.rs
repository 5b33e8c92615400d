//! Task board service: task CRUD over form submissions, plus a cached task
//! list served through a per-request memo and a time-windowed data cache.

pub mod actions;
pub mod cache;
pub mod config;
pub mod error;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod store;

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Router over an empty in-memory store with the default cache window.
pub fn app() -> Router {
    router(default_state())
}

pub fn router(state: AppState) -> Router {
    routes::router(state).layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, default_state()).await
}

pub async fn run_with(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

fn default_state() -> AppState {
    AppState::in_memory(Duration::from_secs(
        config::DEFAULT_CACHE_REVALIDATE_SECONDS,
    ))
}
