//! Classroom Agent
//!
//! Headless runner for the classroom core: keeps one principal's session
//! lists fresh and exposes health and metrics endpoints.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Initialize Prometheus metrics recorder
//! 4. Start health HTTP server (liveness, readiness, metrics)
//! 5. Create the session directory client and start the discovery poller
//! 6. Log view changes until a shutdown signal arrives

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use classroom_service::config::Config;
use classroom_service::directory::HttpSessionDirectory;
use classroom_service::eligibility::SystemClock;
use classroom_service::observability::metrics::init_metrics_recorder;
use classroom_service::observability::{health_router, HealthState};
use classroom_service::tasks::{DiscoveryView, SessionDiscoveryPoller};
use common::config::ObservabilityConfig;
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(&config.observability);

    info!("Starting Classroom Agent");
    info!(
        directory_url = %config.directory_url,
        principal_id = %config.principal_id,
        role = %config.role,
        poll_interval_seconds = config.poll_interval_seconds,
        start_lead_minutes = config.start_lead_minutes,
        join_lead_minutes = config.join_lead_minutes,
        health_bind_address = %config.health_bind_address,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(Arc::clone(&health_state))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind before spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let directory = HttpSessionDirectory::new(
        config.directory_url.clone(),
        config.api_token.clone(),
        std::time::Duration::from_secs(config.directory_timeout_seconds),
    )?;

    let mut poller = SessionDiscoveryPoller::new(
        Arc::new(directory),
        Arc::new(SystemClock),
        config.poller_settings(),
    );
    let view_rx = poller.subscribe();
    poller.start(config.role_context());

    let watcher_token = shutdown_token.child_token();
    let watcher = tokio::spawn(watch_view(
        view_rx,
        Arc::clone(&health_state),
        watcher_token,
    ));

    shutdown_signal().await;
    info!("Shutdown signal received, stopping");

    health_state.set_not_ready();
    poller.stop();
    shutdown_token.cancel();

    if let Err(e) = watcher.await {
        warn!(error = %e, "View watcher task ended abnormally");
    }
    if let Err(e) = health_task.await {
        warn!(error = %e, "Health server task ended abnormally");
    }

    info!("Classroom Agent shutdown complete");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Log each published view and mark the agent ready after the first
/// successful fetch.
async fn watch_view(
    mut view_rx: watch::Receiver<DiscoveryView>,
    health_state: Arc<HealthState>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let view = view_rx.borrow_and_update().clone();
        if view.last_success_at.is_some() && !health_state.is_ready() {
            health_state.set_ready();
            info!("First session list received, agent is ready");
        }
        health_state.set_stale(view.last_error.is_some());

        match &view.last_error {
            Some(failure) => warn!(
                code = failure.code,
                stale_sessions = view.len(),
                "Session list is stale: {}",
                failure.message
            ),
            None => info!(
                live = view.live.len(),
                upcoming = view.upcoming.len(),
                past = view.past.len(),
                joinable = view
                    .upcoming
                    .iter()
                    .chain(&view.live)
                    .filter(|entry| entry.eligibility.can_join)
                    .count(),
                "Session lists updated"
            ),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
