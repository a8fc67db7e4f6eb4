//! HTTP server assembly, background eviction and graceful shutdown.

use crate::config::ServerConfig;
use crate::gateway::Gateway;
use crate::registry::SessionRegistry;
use crate::transport::ws_handler;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};

/// Builds the router: `/ws`, `/healthz`, and an optional static directory
/// for everything else.
#[instrument(skip(gateway))]
pub fn router(gateway: Gateway, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz));

    if let Some(dir) = static_dir {
        info!(dir = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(gateway)
}

async fn healthz(State(gateway): State<Gateway>) -> Json<Value> {
    let stats = gateway.registry().stats();
    Json(json!({
        "status": "ok",
        "waiting": stats.waiting,
        "sessions": stats.sessions,
        "connections": gateway.connections(),
    }))
}

/// Shortest pause between eviction passes.
const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically evicts sessions that have been finished for `grace`.
///
/// `every` is raised to one second if shorter.
#[instrument(skip(registry))]
pub fn spawn_reaper(registry: SessionRegistry, grace: Duration, every: Duration) -> JoinHandle<()> {
    let every = every.max(MIN_REAP_INTERVAL);
    info!(?every, "Starting session reaper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_finished(grace);
            if evicted > 0 {
                debug!(evicted, stats = ?registry.stats(), "Reaper pass");
            }
        }
    })
}

/// Serves on `listener` until `shutdown` resolves.
///
/// When `shutdown` resolves every live session is abandoned and its
/// participants told before the listener stops.
///
/// # Errors
///
/// Fails if `config` does not validate or the listener fails.
pub async fn serve<F>(
    listener: TcpListener,
    gateway: Gateway,
    config: &ServerConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let reaper = spawn_reaper(
        gateway.registry().clone(),
        config.eviction_grace(),
        config.reap_interval(),
    );

    let app = router(gateway.clone(), config.static_dir().as_deref());
    let closing = gateway.clone();

    info!(addr = %listener.local_addr()?, "Server ready");
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested");
            closing.shutdown();
        })
        .await;

    reaper.abort();
    result?;
    info!("Server stopped");
    Ok(())
}

/// Binds the configured address and serves until Ctrl-C.
#[instrument(skip(config), fields(host = %config.host(), port = config.port()))]
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!("Server will listen on http://{}:{}", config.host(), config.port());

    let gateway = Gateway::new(SessionRegistry::new());
    serve(listener, gateway, &config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serve_rejects_invalid_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig::from_toml("reap_interval_secs = 0").unwrap();

        let result = serve(listener, Gateway::default(), &config, async {}).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reaper_survives_zero_interval() {
        let registry = SessionRegistry::new();
        let reaper = spawn_reaper(registry, Duration::ZERO, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reaper.is_finished());
        reaper.abort();
    }

    #[tokio::test]
    async fn test_healthz_reports_counts() {
        let gateway = Gateway::default();
        let Json(body) = healthz(State(gateway)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["waiting"], 0);
        assert_eq!(body["sessions"], 0);
    }
}
