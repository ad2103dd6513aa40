use crate::config::Config;
use crate::handlers::{
    call_counts, create_user, delete_user, get_user, list_users, route_index, update_user,
};
use crate::middleware::{
    auth_stage, bypass_stage, handle_panic, logging_stage, rate_limit_stage, tracking_stage,
    BypassRoute,
};
use crate::state::{AppState, SharedState};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

/// User routes without any middleware attached.
pub fn routes(state: SharedState) -> Router {
    let bypass_prefix = state.settings.bypass_prefix.clone();

    Router::new()
        .route("/api/user", get(list_users))
        .route("/api/user/create", post(create_user))
        .route("/api/user/apicallcounts", get(call_counts))
        .route(
            "/api/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route(&bypass_prefix, get(route_index))
        .with_state(state)
}

/// Wrap `terminal` in the request pipeline.
///
/// Stages run outermost first: exception boundary, bypass check, auth, rate
/// limit, logging, call tracking. A stage that answers on its own stops every
/// stage after it.
pub fn with_pipeline(terminal: Router, state: SharedState) -> Router {
    let bypass = BypassRoute {
        prefix: state.settings.bypass_prefix.clone(),
        terminal: terminal.clone(),
    };

    terminal.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn_with_state(bypass, bypass_stage))
            .layer(middleware::from_fn_with_state(state.clone(), auth_stage))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_stage))
            .layer(middleware::from_fn_with_state(state.clone(), logging_stage))
            .layer(middleware::from_fn_with_state(state, tracking_stage)),
    )
}

pub fn create_app(state: SharedState) -> Router {
    with_pipeline(routes(state.clone()), state)
}

pub struct Server {
    config: Config,
    state: SharedState,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let state = AppState::shared(&config);
        Self { config, state }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let cleanup = spawn_window_cleanup(self.state.clone(), self.config.cleanup_interval());
        let app = create_app(self.state.clone());

        tracing::info!("User API listening on {}", listener.local_addr()?);
        tracing::info!(
            "Rate limit: {} requests per {}s per client",
            self.config.rate_limit_permits,
            self.config.rate_limit_window_secs
        );

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        cleanup.abort();
        result?;
        Ok(())
    }
}

/// Periodically drop rate limit windows for clients that have gone quiet.
fn spawn_window_cleanup(
    state: SharedState,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.rate_limiter.cleanup_expired(Instant::now()) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Removed idle rate limit windows"),
                Err(err) => tracing::warn!(error = %err, "Rate limit window cleanup failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
