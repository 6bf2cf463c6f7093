use anyhow::{Context, Result};
use axum::Router;
use colored::Colorize;
use std::future::Future;
use std::sync::Arc;
use termgate_terminal::{ProcessLauncher, SessionRegistry};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::web::routes::{self, AppState};

/// Web server instance
pub struct WebServer {
    config: Arc<GatewayConfig>,
    registry: Arc<SessionRegistry>,
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: GatewayConfig) -> Self {
        let launcher = ProcessLauncher::new(config.bridge_path.clone()).with_shell(config.shell.clone());
        let registry = SessionRegistry::new(Arc::new(launcher))
            .with_max_sessions(config.max_sessions)
            .with_transcripts(config.transcript_dir.clone());

        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    /// The registry every connection goes through
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            config: self.config.clone(),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let mut app = routes::create_router(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

        if let Some(web_dir) = &self.config.web_dir {
            if web_dir.exists() {
                tracing::info!("Serving static files from: {}", web_dir.display());
                app = app.nest_service("/static", ServeDir::new(web_dir));
            } else {
                tracing::warn!("Web directory {} does not exist", web_dir.display());
            }
        }

        app
    }

    /// Bind, announce and serve until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local = listener.local_addr().unwrap_or(addr);

        println!("{} {}", "🖥  termgate listening on".bright_green().bold(), format!("http://{}", local).cyan());
        println!("   WebSocket endpoint: ws://{}/terminal/{{session_id}}", local);
        println!("   API endpoints:      http://{}/api/terminals", local);
        println!("   Default workspace:  {}", self.config.workspace_dir.display());
        println!("   Bridge:             {}", self.config.bridge_path.display());
        println!("{}", "Press Ctrl+C to stop".dimmed());

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve on an already bound listener. Once `shutdown` resolves, new
    /// connections stop and every live session is closed.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let registry = self.registry.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutting down, closing {} session(s)", registry.len().await);
                registry.close_all().await;
            })
            .await
            .context("Server error")?;

        Ok(())
    }
}
