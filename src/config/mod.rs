//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (read once at startup)
//!     → loader.rs (WHITE_IP_LIST, AWS_XRAY_* variables)
//!     → ServerConfig (immutable)
//!     → shared via Arc with the request path
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing re-reads the environment
//! - All fields have defaults so tests can build a config without env vars

pub mod loader;
pub mod schema;

pub use loader::{load_from_env, load_with};
pub use schema::{FilterConfig, ServerConfig, TracingConfig};
