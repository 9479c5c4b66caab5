//! Allow-listed HTTP server with per-request trace segments.

pub mod config;
pub mod http;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
