//! Fixed-response route handlers.
//!
//! Each handler annotates the request's segment, writes one `[INFO]` line
//! through a [`TraceLogger`] and returns a constant body. Method and payload
//! are ignored.

use axum::extract::{Extension, State};

use crate::http::server::AppState;
use crate::observability::{SegmentHandle, TraceLogger};

/// What a handler records and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedResponse {
    pub user: &'static str,
    pub debug_info: &'static str,
    pub body: &'static str,
}

pub const HOME: FixedResponse = FixedResponse {
    user: "example-user",
    debug_info: "sample metadata",
    body: "home",
};

pub const TOP: FixedResponse = FixedResponse {
    user: "example-user2",
    debug_info: "sample metadata2",
    body: "hello world",
};

/// Record annotation, metadata and the log line, then hand back the body.
pub fn respond(fixed: FixedResponse, segment: &SegmentHandle, log: &TraceLogger) -> &'static str {
    segment.add_annotation("User", fixed.user);
    segment.add_metadata("debug-info", fixed.debug_info);
    log.info(fixed.body);
    fixed.body
}

/// `/home`
pub async fn home(
    State(state): State<AppState>,
    Extension(segment): Extension<SegmentHandle>,
) -> &'static str {
    let log = TraceLogger::for_segment(&segment, state.sink.clone());
    respond(HOME, &segment, &log)
}

/// `/` and every path without its own route.
pub async fn top(
    State(state): State<AppState>,
    Extension(segment): Extension<SegmentHandle>,
) -> &'static str {
    let log = TraceLogger::for_segment(&segment, state.sink.clone());
    respond(TOP, &segment, &log)
}
