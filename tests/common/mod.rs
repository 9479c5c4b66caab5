//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use traced_gate::config::ServerConfig;
use traced_gate::http::HttpServer;
use traced_gate::observability::{MemorySink, Segment, SegmentEmitter};

/// Keeps every emitted segment.
#[derive(Default)]
pub struct RecordingEmitter {
    segments: Mutex<Vec<Segment>>,
}

#[allow(dead_code)]
impl RecordingEmitter {
    pub fn segments(&self) -> Vec<Segment> {
        self.segments.lock().unwrap().clone()
    }
}

impl SegmentEmitter for RecordingEmitter {
    fn emit(&self, segment: &Segment) {
        self.segments.lock().unwrap().push(segment.clone());
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    #[allow(dead_code)]
    pub emitter: Arc<RecordingEmitter>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the server on an ephemeral loopback port.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let sink = Arc::new(MemorySink::new());
    let emitter = Arc::new(RecordingEmitter::default());

    let server = HttpServer::new(&config, emitter.clone(), sink.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer { addr, sink, emitter }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
