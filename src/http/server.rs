//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the admission filter and tracer from [`ServerConfig`]
//! - Create the Axum router with both handlers
//! - Wire up middleware (request spans, IP filter, trace segments)
//! - Serve connections until the process is terminated

use axum::{middleware, routing::any, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::handlers::{home, top};
use crate::observability::{trace_middleware, LogSink, SegmentEmitter, Tracer};
use crate::security::{ip_filter_middleware, FilterOptions, IpFilter};

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<dyn LogSink>,
}

/// HTTP server for the two fixed routes.
pub struct HttpServer {
    router: Router,
    filter: Arc<IpFilter>,
}

impl HttpServer {
    /// Create a server. The allow-list is frozen here.
    pub fn new(
        config: &ServerConfig,
        emitter: Arc<dyn SegmentEmitter>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let filter = Arc::new(IpFilter::new(FilterOptions::from(&config.filter)));
        let tracer = Tracer::new(config.tracing.segment_name.as_str(), emitter);
        let router = build_router(filter.clone(), tracer, AppState { sink });
        Self { router, filter }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            allowed_ranges = self.filter.ranges().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Bind the listening socket.
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Build the Axum router with all middleware layers.
///
/// Outermost first: request span, IP filter, trace segment, handler.
pub fn build_router(filter: Arc<IpFilter>, tracer: Tracer, state: AppState) -> Router {
    Router::new()
        .route("/home", any(home))
        .fallback(top)
        .with_state(state)
        .layer(middleware::from_fn_with_state(tracer, trace_middleware))
        .layer(middleware::from_fn_with_state(filter, ip_filter_middleware))
        .layer(TraceLayer::new_for_http())
}
