//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, connect info)
//!     → security (IP allow-list, 403 on miss)
//!     → observability::tracing (segment per request)
//!     → handlers.rs (annotate, log, fixed body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod server;

pub use server::{bind, build_router, AppState, HttpServer, ServerError};
