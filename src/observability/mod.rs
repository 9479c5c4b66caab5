//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Process events:
//!     → tracing macros → logging.rs subscriber (RUST_LOG filter, stdout)
//!
//! Per request:
//!     → tracing.rs middleware opens a segment (X-Amzn-Trace-Id)
//!     → handlers annotate it and log through TraceLogger
//!     → segment closed and emitted to the trace daemon over UDP
//! ```

pub mod logging;
pub mod tracing;

pub use logging::{init_subscriber, LogSink, MemorySink, StdoutSink, TraceLogger};
pub use self::tracing::{
    trace_middleware, xray_trace_id, NoopEmitter, Segment, SegmentEmitter, SegmentHandle, Tracer,
    UdpEmitter, X_AMZN_TRACE_ID,
};
