use std::net::SocketAddr;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::storage::{Storage, StorageRead};

mod handlers;
mod models;

use handlers::{
    clock_in, clock_out, follow_user, get_user, health, list_sleep_records, list_users, not_found,
    unfollow_user,
};

#[derive(Clone)]
pub struct AppState<S: StorageRead> {
    pub storage: S,
    pub started_at: std::time::SystemTime,
    /// Page size used when a request carries no `limit`.
    pub default_limit: u64,
}

pub(crate) fn router<S: Storage + Clone + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health::<S>))
        .route("/v1/users", get(list_users::<S>))
        .route("/v1/users/:id", get(get_user::<S>))
        .route("/v1/users/:id/follows", post(follow_user::<S>))
        .route("/v1/users/:id/unfollows", delete(unfollow_user::<S>))
        .route("/v1/sleeps", get(list_sleep_records::<S>))
        .route("/v1/sleeps/clock_in", post(clock_in::<S>))
        .route("/v1/sleeps/clock_out", post(clock_out::<S>))
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve<S: Storage + Clone + Send + Sync + 'static>(
    addr: SocketAddr,
    storage: S,
    default_limit: u64,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    log::info!("🌐 REST service on http://{}", addr);

    let app = router(AppState {
        storage,
        started_at: std::time::SystemTime::now(),
        default_limit,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("🛑 REST shutdown requested");
        })
        .await?;
    log::info!("👋 REST server exited");
    Ok(())
}
