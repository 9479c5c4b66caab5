//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (resolve client IP, honoring proxy headers)
//!     → ip_filter.rs (allow-list decision)
//!     → 403 Forbidden, or pass to tracing + handlers
//! ```
//!
//! # Design Decisions
//! - Fail closed: an unresolvable client address is rejected
//! - The allow-list is frozen before the listener starts

pub mod access_control;
pub mod ip_filter;

pub use access_control::{ip_filter_middleware, ClientAddr};
pub use ip_filter::{parse_range, FilterOptions, IpFilter, ParseRangeError};
