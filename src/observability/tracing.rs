//! Distributed tracing support.
//!
//! # Responsibilities
//! - Continue or start a trace from the `X-Amzn-Trace-Id` request header
//! - Open one segment per request and hand a [`SegmentHandle`] to handlers
//! - Close the segment with response facts and pass it to a [`SegmentEmitter`]
//!
//! # Wire format
//! Segments are JSON documents sent to the trace daemon over UDP, each
//! prefixed with `{"format": "json", "version": 1}` and a newline.

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use opentelemetry::Context;
use opentelemetry_aws::trace::{XrayIdGenerator, XrayPropagator};
use opentelemetry_sdk::trace::IdGenerator;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::UdpSocket;

use crate::security::ClientAddr;

pub const X_AMZN_TRACE_ID: &str = "x-amzn-trace-id";

const DAEMON_HEADER: &[u8] = b"{\"format\": \"json\", \"version\": 1}\n";
const DEFAULT_METADATA_NAMESPACE: &str = "default";

/// `1-<epoch hex>-<random hex>` form of a trace id.
pub fn xray_trace_id(trace_id: TraceId) -> String {
    let hex = format!("{:032x}", trace_id);
    format!("1-{}-{}", &hex[..8], &hex[8..])
}

fn segment_id(span_id: SpanId) -> String {
    format!("{:016x}", span_id)
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl<'a> Injector for HeaderInjector<'a> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HttpRequestInfo {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub x_forwarded_for: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HttpResponseInfo {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HttpInfo {
    pub request: HttpRequestInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpResponseInfo>,
}

/// One request's unit of work as reported to the trace daemon.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub in_progress: bool,
    pub http: HttpInfo,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub throttle: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fault: bool,
    #[serde(skip)]
    pub sampled: bool,
}

impl Segment {
    fn close(&mut self, status: StatusCode, content_length: Option<u64>) {
        self.end_time = Some(now_secs());
        self.in_progress = false;
        self.http.response = Some(HttpResponseInfo {
            status: status.as_u16(),
            content_length,
        });
        self.throttle = status == StatusCode::TOO_MANY_REQUESTS;
        self.error = status.is_client_error();
        self.fault = status.is_server_error();
    }

    /// Daemon datagram: protocol header line followed by the JSON document.
    pub fn to_datagram(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = DAEMON_HEADER.to_vec();
        serde_json::to_writer(&mut buf, self)?;
        Ok(buf)
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Request-scoped access to the open segment.
///
/// Cloned into request extensions; all clones share one segment.
#[derive(Debug, Clone)]
pub struct SegmentHandle {
    trace_id: Arc<str>,
    span_context: SpanContext,
    inner: Arc<Mutex<Segment>>,
}

impl SegmentHandle {
    fn new(span_context: SpanContext, segment: Segment) -> Self {
        Self {
            trace_id: segment.trace_id.as_str().into(),
            span_context,
            inner: Arc::new(Mutex::new(segment)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Segment> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Trace id in `1-xxxxxxxx-xxxxxxxxxxxxxxxxxxxxxxxx` form.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Indexed key/value pair.
    pub fn add_annotation(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().annotations.insert(key.into(), value.into());
    }

    /// Non-indexed value under the `default` namespace.
    pub fn add_metadata(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock()
            .metadata
            .entry(DEFAULT_METADATA_NAMESPACE.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn sampled(&self) -> bool {
        self.span_context.is_sampled()
    }

    /// Copy of the segment as it currently stands.
    pub fn snapshot(&self) -> Segment {
        self.lock().clone()
    }
}

/// Destination for closed segments.
pub trait SegmentEmitter: Send + Sync {
    fn emit(&self, segment: &Segment);
}

/// Sends segments to the trace daemon over UDP. Best effort.
///
/// Each datagram is sent from a spawned task so `emit` never blocks the
/// response path.
pub struct UdpEmitter {
    socket: Arc<UdpSocket>,
    daemon: SocketAddr,
}

impl UdpEmitter {
    pub async fn bind(daemon: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = if daemon.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket: Arc::new(socket),
            daemon,
        })
    }
}

impl SegmentEmitter for UdpEmitter {
    fn emit(&self, segment: &Segment) {
        let datagram = match segment.to_datagram() {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to encode segment");
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(trace_id = %segment.trace_id, "No runtime, segment dropped");
            return;
        };

        let socket = self.socket.clone();
        let daemon = self.daemon;
        let trace_id = segment.trace_id.clone();
        runtime.spawn(async move {
            if let Err(e) = socket.send_to(&datagram, daemon).await {
                tracing::debug!(
                    daemon = %daemon,
                    trace_id = %trace_id,
                    error = %e,
                    "Failed to send segment"
                );
            }
        });
    }
}

/// Drops every segment.
pub struct NoopEmitter;

impl SegmentEmitter for NoopEmitter {
    fn emit(&self, _segment: &Segment) {}
}

/// Opens and closes segments under a fixed name.
///
/// Trace ids and segment ids come from the X-Ray id generator; the
/// `X-Amzn-Trace-Id` header is read and written by the X-Ray propagator.
#[derive(Clone)]
pub struct Tracer {
    name: Arc<str>,
    emitter: Arc<dyn SegmentEmitter>,
    propagator: Arc<XrayPropagator>,
    ids: Arc<XrayIdGenerator>,
}

impl Tracer {
    pub fn new(name: impl Into<Arc<str>>, emitter: Arc<dyn SegmentEmitter>) -> Self {
        Self {
            name: name.into(),
            emitter,
            propagator: Arc::new(XrayPropagator::default()),
            ids: Arc::new(XrayIdGenerator::default()),
        }
    }

    /// Open a segment for an incoming request.
    ///
    /// A valid incoming trace is continued and its segment becomes the
    /// parent. Only an explicit `Sampled=0` turns emission off.
    pub fn begin(
        &self,
        headers: &HeaderMap,
        method: &Method,
        uri: &Uri,
        client: Option<ClientAddr>,
    ) -> SegmentHandle {
        let incoming = self.propagator.extract(&HeaderExtractor(headers));
        let remote = incoming.span().span_context().clone();

        let (trace_id, parent_id, sampled) = if remote.is_valid() {
            (
                remote.trace_id(),
                Some(segment_id(remote.span_id())),
                remote.trace_flags() != TraceFlags::NOT_SAMPLED,
            )
        } else {
            (self.ids.new_trace_id(), None, true)
        };

        let flags = if sampled {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::NOT_SAMPLED
        };
        let span_context = SpanContext::new(
            trace_id,
            self.ids.new_span_id(),
            flags,
            false,
            TraceState::default(),
        );

        let url = match headers.get(axum::http::header::HOST).and_then(|h| h.to_str().ok()) {
            Some(host) if uri.authority().is_none() => format!("http://{}{}", host, uri),
            _ => uri.to_string(),
        };

        let segment = Segment {
            name: self.name.to_string(),
            id: segment_id(span_context.span_id()),
            trace_id: xray_trace_id(trace_id),
            parent_id,
            start_time: now_secs(),
            end_time: None,
            in_progress: true,
            http: HttpInfo {
                request: HttpRequestInfo {
                    method: method.to_string(),
                    url,
                    client_ip: client.map(|c| c.ip.to_string()),
                    x_forwarded_for: client.is_some_and(|c| c.forwarded),
                    user_agent: headers
                        .get(axum::http::header::USER_AGENT)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                },
                response: None,
            },
            annotations: BTreeMap::new(),
            metadata: BTreeMap::new(),
            error: false,
            throttle: false,
            fault: false,
            sampled,
        };

        SegmentHandle::new(span_context, segment)
    }

    /// Write the segment's `X-Amzn-Trace-Id` into `headers`.
    pub fn inject(&self, handle: &SegmentHandle, headers: &mut HeaderMap) {
        let cx = Context::new().with_remote_span_context(handle.span_context().clone());
        self.propagator.inject_context(&cx, &mut HeaderInjector(headers));
    }

    /// Close the segment and emit it if sampled.
    pub fn finish(&self, handle: &SegmentHandle, status: StatusCode, content_length: Option<u64>) {
        let segment = {
            let mut segment = handle.lock();
            segment.close(status, content_length);
            segment.clone()
        };
        if segment.sampled {
            self.emitter.emit(&segment);
        }
    }
}

pub async fn trace_middleware(
    State(tracer): State<Tracer>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let client = req.extensions().get::<ClientAddr>().copied();
    let segment = tracer.begin(req.headers(), req.method(), req.uri(), client);
    req.extensions_mut().insert(segment.clone());

    let mut response = next.run(req).await;

    tracer.inject(&segment, response.headers_mut());
    let content_length = response.body().size_hint().exact();
    tracer.finish(&segment, response.status(), content_length);

    response
}
