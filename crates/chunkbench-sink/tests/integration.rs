use axum::Router;
use chunkbench_sink::{app, SinkState};

async fn spawn_sink(state: SinkState) -> String {
    let app: Router = app(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}", addr.ip(), addr.port())
}

#[tokio::test]
async fn put_get_delete_roundtrip() {
    let state = SinkState::new(4);
    let base = spawn_sink(state.clone()).await;
    let client = reqwest::Client::new();

    // health and metrics
    let r = client.get(format!("{}/healthz", base)).send().await.unwrap();
    assert!(r.status().is_success());
    let r = client.get(format!("{}/metrics", base)).send().await.unwrap();
    assert!(r.status().is_success());

    // range put is split into chunk_size pieces
    let r = client
        .put(format!("{}/wnam-location/0,2", base))
        .header("X-Location-Hint", "wnam")
        .body(b"aaaabbbbcccc".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(state.chunk_count().await, 3);

    let r = client.get(format!("{}/wnam-location/1", base)).send().await.unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(&r.bytes().await.unwrap()[..], b"bbbb");

    // single index keeps the whole body
    let r = client.put(format!("{}/wnam-location/9", base)).body(b"whole body".to_vec()).send().await.unwrap();
    assert_eq!(r.status(), 200);
    let r = client.get(format!("{}/wnam-location/9", base)).send().await.unwrap();
    assert_eq!(&r.bytes().await.unwrap()[..], b"whole body");

    let r = client.delete(format!("{}/wnam-location", base)).send().await.unwrap();
    assert_eq!(r.status(), 200);
    let r = client.get(format!("{}/wnam-location/1", base)).send().await.unwrap();
    assert_eq!(r.status(), 404);
    assert_eq!(r.text().await.unwrap(), "BLOCK_CHUNK_NOT_FOUND");
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let base = spawn_sink(SinkState::default()).await;
    let client = reqwest::Client::new();

    let r = client.put(format!("{}/k/x,1", base)).body(vec![1u8; 8]).send().await.unwrap();
    assert_eq!(r.status(), 400);
    assert_eq!(r.text().await.unwrap(), "INDEX_QUERY_MALFORMED");

    let r = client.put(format!("{}/k/0,1", base)).send().await.unwrap();
    assert_eq!(r.status(), 400);
    assert_eq!(r.text().await.unwrap(), "NEEDS_BODY");
}

#[tokio::test]
async fn multi_megabyte_range_is_accepted() {
    let state = SinkState::default();
    let base = spawn_sink(state.clone()).await;
    let client = reqwest::Client::new();

    // 20 chunks of 128 KiB, above axum's default 2 MB body limit
    let body: Vec<u8> = (0..20u8).flat_map(|i| vec![i; 128 * 1024]).collect();
    let r = client.put(format!("{}/wnam-location/0,19", base)).body(body).send().await.unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(r.text().await.unwrap(), "OK");
    assert_eq!(state.chunk_count().await, 20);

    let r = client.get(format!("{}/wnam-location/19", base)).send().await.unwrap();
    let chunk = r.bytes().await.unwrap();
    assert_eq!(chunk.len(), 128 * 1024);
    assert!(chunk.iter().all(|&b| b == 19));
}

#[tokio::test]
async fn replies_match_the_block_store() {
    let base = spawn_sink(SinkState::new(4)).await;
    let client = reqwest::Client::new();

    let r = client.put(format!("{}/k/3", base)).body(b"one".to_vec()).send().await.unwrap();
    assert_eq!(r.status(), 200);
    assert_eq!(r.text().await.unwrap(), "ok");

    let r = client.put(format!("{}/k/0,1", base)).body(b"aaaabbbb".to_vec()).send().await.unwrap();
    assert_eq!(r.text().await.unwrap(), "OK");

    let r = client.post(format!("{}/k/0", base)).body(b"x".to_vec()).send().await.unwrap();
    assert_eq!(r.status(), 404);
    assert_eq!(r.text().await.unwrap(), "I_DONT_UNDERSTAND");

    let r = client.patch(format!("{}/k", base)).send().await.unwrap();
    assert_eq!(r.status(), 404);
    assert_eq!(r.text().await.unwrap(), "I_DONT_UNDERSTAND");
}
