pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, Collaborators};

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Check-ins
        .route("/api/checkins", post(routes::checkins::submit_checkin))
        // Insights
        .route(
            "/api/projects/{id}/insights",
            post(routes::insights::generate_insight),
        )
        .route(
            "/api/projects/{id}/insights/{date}",
            get(routes::insights::get_insight),
        )
        // Content
        .route(
            "/api/projects/{id}/content",
            post(routes::content::generate_content),
        )
        // Reminders
        .route(
            "/api/projects/{id}/reminders",
            post(routes::reminders::send_reminder),
        )
        // Trends
        .route("/api/owners/{id}/trends", get(routes::trends::get_trends))
        .route(
            "/api/owners/{id}/dashboard",
            get(routes::trends::get_dashboard),
        )
        // Schedules
        .route("/api/schedules/convert", get(routes::schedules::convert))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Options for [`serve_on`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Run the hourly dispatch loop alongside the HTTP API.
    pub scheduler: bool,
    pub stale_claim_after: chrono::Duration,
    /// Sweep the current hour at startup instead of waiting for the next one.
    pub catch_up_on_start: bool,
}

/// Start the API server on `port`.
pub async fn serve(app_state: AppState, port: u16, opts: ServeOptions) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener, opts).await
}

/// Start the API server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port). Runs until Ctrl-C.
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    opts: ServeOptions,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if opts.scheduler {
        let state = app_state.clone();
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(scheduler::run(
            state,
            opts.stale_claim_after,
            opts.catch_up_on_start,
            rx,
        )))
    } else {
        tracing::info!("scheduler disabled");
        None
    };

    let app = build_router(app_state);
    tracing::info!("standup API listening on http://localhost:{actual_port}");

    let mut rx = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = rx.changed() => {}
            }
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler {
        handle.await??;
    }
    Ok(())
}
