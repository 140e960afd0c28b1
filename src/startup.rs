//! Application Startup
//!
//! Application building, server initialization and signal-driven shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::application::services::{
    Readiness, SessionLifecycle, ShutdownCoordinator, ShutdownOutcome,
};
use crate::config::Settings;
use crate::domain::SessionStateStore;
use crate::infrastructure::cache;
use crate::infrastructure::metrics::SessionMetrics;
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::logging;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SessionLifecycle>,
    pub readiness: Readiness,
    pub metrics: SessionMetrics,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let store = cache::create_session_store(
            &settings.store,
            &settings.redis,
            settings.session.reconnection_window(),
        )
        .await;
        tracing::info!(
            available = store.is_available(),
            "Session store initialized"
        );

        Self::build_with_store(settings, store).await
    }

    /// Build the application around an already constructed session store
    pub async fn build_with_store(
        settings: Settings,
        store: Arc<dyn SessionStateStore>,
    ) -> Result<Self> {
        handlers::health::init_server_start();

        let metrics = SessionMetrics::new();
        let lifecycle = Arc::new(SessionLifecycle::new(
            store,
            metrics.clone(),
            &settings.session,
            settings.redis.operation_timeout(),
        ));
        let readiness = Readiness::new();
        let coordinator = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&lifecycle),
            readiness.clone(),
        ));

        // Create app state
        let state = AppState {
            lifecycle,
            readiness,
            metrics,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state.clone()).layer(logging::create_trace_layer());

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            state,
            coordinator,
        })
    }

    /// Serve until SIGINT or SIGTERM, then drain and exit.
    ///
    /// Returns once the shutdown grace window has elapsed. A fault in the
    /// drain itself terminates the process with a non-zero status.
    pub async fn run_until_stopped(self) -> Result<()> {
        let Application {
            listener,
            router,
            state,
            coordinator,
        } = self;

        state
            .readiness
            .spawn_ready_after(state.settings.shutdown.readiness_delay());

        let mut server = tokio::spawn(async move { axum::serve(listener, router).await });

        tokio::select! {
            result = &mut server => {
                // The server only stops on its own when it fails
                result??;
                return Ok(());
            }
            _ = shutdown_signal() => {}
        }

        // Further signals while draining are acknowledged and ignored
        let repeat = Arc::clone(&coordinator);
        tokio::spawn(async move {
            loop {
                shutdown_signal().await;
                if repeat.drain().await == ShutdownOutcome::AlreadyInProgress {
                    tracing::info!("Shutdown already in progress, signal ignored");
                }
            }
        });

        match coordinator
            .terminate(state.settings.shutdown.grace_window())
            .await
        {
            Ok(outcome) => {
                tracing::info!(?outcome, "Shutdown complete");
                server.abort();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Shutdown failed, forcing exit");
                std::process::exit(1);
            }
        }
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with all routes and middleware
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Coordinator that drains this instance
    pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Serve in the background without signal handling
    pub fn spawn(self) -> tokio::task::JoinHandle<std::io::Result<()>> {
        self.state
            .readiness
            .spawn_ready_after(self.state.settings.shutdown.readiness_delay());
        tokio::spawn(async move { axum::serve(self.listener, self.router).await })
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
