//! traced-gate
//!
//! Two fixed routes behind an IP allow-list, traced per request.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ──▶ IP filter ──▶ trace segment ──▶ handler
//!                                       │                              │
//!                                       ▼                              ▼
//!                                 403 Forbidden              [INFO] [Trace-ID: ..]
//!                                                            segment → UDP daemon
//! ```

use std::sync::Arc;

use traced_gate::config;
use traced_gate::http::{self, HttpServer};
use traced_gate::observability::{self, NoopEmitter, SegmentEmitter, StdoutSink, UdpEmitter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_subscriber();

    tracing::info!("traced-gate v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config::load_from_env();

    tracing::info!(
        bind_address = config.bind_address(),
        segment_name = %config.tracing.segment_name,
        daemon_address = %config.tracing.daemon_address,
        tracing_disabled = config.tracing.disabled,
        "Configuration loaded"
    );

    let emitter: Arc<dyn SegmentEmitter> = if config.tracing.disabled {
        Arc::new(NoopEmitter)
    } else {
        Arc::new(UdpEmitter::bind(config.tracing.daemon_address).await?)
    };

    let server = HttpServer::new(&config, emitter, Arc::new(StdoutSink));
    let listener = http::bind(config.bind_address()).await?;

    server.run(listener).await?;
    Ok(())
}
