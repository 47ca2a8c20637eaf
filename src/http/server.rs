//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (CORS, tracing, gatekeeper, body limit, panics)
//! - Serve on a bound listener until shutdown is requested

use axum::{extract::DefaultBodyLimit, middleware, Router};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::context::AppContext;
use crate::http::{gatekeeper::gatekeeper, routes};
use crate::lifecycle::shutdown::ShutdownTrigger;

/// HTTP server for the companion host.
pub struct HttpServer {
    ctx: AppContext,
    routes: Router<AppContext>,
}

impl HttpServer {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            routes: routes::router(),
        }
    }

    /// Add routes served behind the same middleware stack.
    pub fn with_routes(mut self, routes: Router<AppContext>) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Build the final router.
    ///
    /// Layer order, outermost first: CORS, trace, gatekeeper, body limit,
    /// panic catcher. The fallback sits behind the gatekeeper too.
    pub fn into_router(self) -> Router {
        let max_body = self.ctx.config().security.max_body_bytes;
        self.routes
            .fallback(routes::not_found)
            .layer(CatchPanicLayer::new())
            .layer(DefaultBodyLimit::max(max_body))
            .layer(middleware::from_fn_with_state(self.ctx.clone(), gatekeeper))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.ctx)
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownTrigger) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
