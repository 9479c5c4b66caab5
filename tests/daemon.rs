//! UDP delivery to a stand-in trace daemon.

use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use std::sync::Arc;
use tokio::net::UdpSocket;
use traced_gate::observability::{Tracer, UdpEmitter};

#[tokio::test]
async fn test_segment_reaches_daemon() {
    let daemon = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let daemon_addr = daemon.local_addr().unwrap();

    let emitter = UdpEmitter::bind(daemon_addr).await.unwrap();
    let tracer = Tracer::new("myApp", Arc::new(emitter));
    let handle = tracer.begin(&HeaderMap::new(), &Method::GET, &"/home".parse().unwrap(), None);
    handle.add_annotation("User", "example-user");
    tracer.finish(&handle, StatusCode::OK, Some(4));

    let mut buf = vec![0u8; 64 * 1024];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), daemon.recv_from(&mut buf))
        .await
        .expect("no datagram")
        .unwrap();

    let text = std::str::from_utf8(&buf[..len]).unwrap();
    let (header, body) = text.split_once('\n').unwrap();
    assert_eq!(header, r#"{"format": "json", "version": 1}"#);

    let doc: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(doc["trace_id"], handle.trace_id());
    assert_eq!(doc["annotations"]["User"], "example-user");
    assert_eq!(doc["http"]["response"]["content_length"], 4);
}
