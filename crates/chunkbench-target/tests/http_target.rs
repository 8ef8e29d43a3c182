use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::put,
    Router,
};
use chunkbench_common::{BenchError, ChunkRange};
use chunkbench_target::{ChunkTarget, HttpTarget};

type Seen = Arc<Mutex<Vec<(String, String, String, usize)>>>;

async fn record(
    State(seen): State<Seen>,
    Path((location, indexes)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let hint = headers
        .get("x-location-hint")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.lock().unwrap().push((location, indexes.clone(), hint, body.len()));
    if indexes == "7,7" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom");
    }
    (StatusCode::OK, "OK")
}

async fn serve(seen: Seen) -> String {
    let app = Router::new().route("/:location/:indexes", put(record)).with_state(seen);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}", addr.ip(), addr.port())
}

#[tokio::test]
async fn put_carries_hint_header_and_payload() {
    let seen: Seen = Arc::default();
    let base = serve(seen.clone()).await;
    let target = HttpTarget::new(&base, "wnam").unwrap();

    target.put_range(ChunkRange::new(0, 4), vec![1u8; 64]).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![("wnam-location".to_string(), "0,3".to_string(), "wnam".to_string(), 64)]);
}

#[tokio::test]
async fn non_200_is_rejected_with_body() {
    let seen: Seen = Arc::default();
    let base = serve(seen).await;
    let target = HttpTarget::new(&base, "wnam").unwrap();

    let err = target.put_range(ChunkRange::new(7, 8), vec![0u8; 8]).await.unwrap_err();
    match err {
        BenchError::Rejected { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = HttpTarget::new(&format!("http://{addr}"), "wnam").unwrap();
    let err = target.put_range(ChunkRange::new(0, 1), vec![0u8; 8]).await.unwrap_err();
    assert!(matches!(err, BenchError::Transport(_)), "{err:?}");
}
