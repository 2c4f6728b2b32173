use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aggregator::{Aggregator, LocalLog, LogApi, SthCache, SthManager};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use decider::{Correlation, DeciderConfig};
use tlog::{verify_consistency_proof, Ed25519Signer, Ed25519Verifier, FileStorage, LogCore, LogSigner, SignedTreeHead, SparseMap};
use tower::ServiceExt;

use tlogd::auth::{sign_payload, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use tlogd::client::HttpLogClient;
use tlogd::routes::{router, DecideFailure};
use tlogd::state::{AppState, SharedState};
use tlogd::wire::{ErrorBody, SthDto, SubmitRequest};

const SECRET: &str = "test-secret";
const SEED: [u8; 32] = [7u8; 32];

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tlogd-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A daemon serving one local log named "self" and aggregating only it.
fn test_state(name: &str, secret: Option<&str>) -> SharedState {
    let dir = scratch_dir(name);
    let signer = Ed25519Signer::from_seed(SEED);
    let verifier = Ed25519Verifier::from_bytes(signer.public_key()).unwrap();

    let store = FileStorage::open(dir.join("self.log.bin")).unwrap();
    let core = Arc::new(LogCore::open("self", store, Arc::new(signer)).unwrap());
    let local = LocalLog::new(core);

    let cache_store = FileStorage::open(dir.join("sth-cache.bin")).unwrap();
    let mut sths = SthManager::new();
    sths.add(SthCache::open("self", Arc::new(local.clone()), Arc::new(verifier), cache_store).unwrap());

    let strategy = DeciderConfig::Percentage { minimum: 50 }.build().unwrap();
    Arc::new(AppState::new(
        Some(local),
        Aggregator::new(Arc::new(sths), strategy),
        secret.map(str::to_string),
    ))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn submit_request(items: &[(&str, &str)], secret: &str, ts: i64) -> Request<Body> {
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = items
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec()))
        .collect();
    let body = serde_json::to_vec(&SubmitRequest::from_pairs(&pairs)).unwrap();
    Request::post("/submit")
        .header("Content-Type", "application/json")
        .header(TIMESTAMP_HEADER, ts.to_string())
        .header(SIGNATURE_HEADER, sign_payload(secret, ts, &body))
        .body(Body::from(body))
        .unwrap()
}

fn parse_sth(body: &[u8]) -> SignedTreeHead {
    let dto: SthDto = serde_json::from_slice(body).unwrap();
    SignedTreeHead::try_from(dto).unwrap()
}

#[tokio::test]
async fn test_sth_is_signed_genesis() {
    let app = router(test_state("genesis", Some(SECRET)));
    let (status, body) = get(&app, "/sth").await;
    assert_eq!(status, StatusCode::OK);

    let sth = parse_sth(&body);
    assert_eq!(sth.tree_size, 0);
    assert_eq!(sth.map_root, SparseMap::new().empty_root());
    assert!(sth.verify(&Ed25519Signer::from_seed(SEED)));
}

#[tokio::test]
async fn test_submit_requires_valid_signature() {
    let app = router(test_state("submit-auth", Some(SECRET)));
    let now = Utc::now().timestamp();

    let (status, _) = send(&app, submit_request(&[("in-1", "out-1")], "wrong", now)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, submit_request(&[("in-1", "out-1")], SECRET, now - 3600)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let unsigned = Request::post("/submit").body(Body::from("{\"items\":[]}")).unwrap();
    let (status, body) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let err: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert!(err.error.contains("X-Timestamp"));

    let (_, body) = get(&app, "/sth").await;
    assert_eq!(parse_sth(&body).tree_size, 0);
}

#[tokio::test]
async fn test_submit_disabled_without_secret() {
    let app = router(test_state("submit-off", None));
    let (status, _) = send(&app, submit_request(&[("in-1", "out-1")], SECRET, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submit_then_duplicate() {
    let app = router(test_state("submit-dup", Some(SECRET)));
    let now = Utc::now().timestamp();

    let (status, body) = send(&app, submit_request(&[("in-1", "out-1"), ("in-2", "out-2")], SECRET, now)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_sth(&body).tree_size, 2);

    let (status, _) = send(&app, submit_request(&[("in-3", "out-3"), ("in-1", "again")], SECRET, now)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(&app, "/sth").await;
    assert_eq!(parse_sth(&body).tree_size, 2);

    let (status, body) = get(&app, "/log/entries?start=0&finish=1").await;
    assert_eq!(status, StatusCode::OK);
    let entries: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(entries["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_structural_errors_are_bad_requests() {
    let app = router(test_state("structural", Some(SECRET)));

    let (status, _) = get(&app, "/log/consistency?first=0&second=5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/log/audit?index=3&tree_size=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/map/value?key=zz&map_root=00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/map/value?key=00&map_root=00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/log/entries?start=2&finish=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decide_and_hash_map() {
    let state = test_state("decide", Some(SECRET));
    let app = router(state.clone());

    let (status, _) = send(&app, submit_request(&[("in-1", "out-1")], SECRET, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::OK);
    state.sths().cache("self").unwrap().refresh().await.unwrap();

    let (status, body) = get(&app, "/decide/in-1").await;
    assert_eq!(status, StatusCode::OK);
    let correlation: Correlation = serde_json::from_slice(&body).unwrap();
    assert_eq!(correlation.decision.output_hash, hex::encode("out-1"));
    assert_eq!(correlation.decision.confidence, 100);
    assert_eq!(correlation.decision.log_names, vec!["self".to_string()]);
    assert!(correlation.mismatches.is_empty());
    assert!(correlation.misses.is_empty());

    let (status, body) = get(&app, "/hashmap/in-1").await;
    assert_eq!(status, StatusCode::OK);
    let map: std::collections::BTreeMap<String, String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(map.get("self"), Some(&hex::encode("out-1")));

    let (status, body) = get(&app, "/decide/in-unknown").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let failure: DecideFailure = serde_json::from_slice(&body).unwrap();
    assert_eq!(failure.misses, vec!["self".to_string()]);
    assert!(failure.responses.is_empty());
}

#[tokio::test]
async fn test_http_client_against_served_log() {
    let state = test_state("http-client", Some(SECRET));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = HttpLogClient::new(format!("http://{addr}/"), Duration::from_secs(5))
        .unwrap()
        .with_submit_secret(Some(SECRET.to_string()));

    let first = client.submit(vec![(b"a".to_vec(), b"1".to_vec())]).await.unwrap();
    let second = client
        .submit(vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())])
        .await
        .unwrap();
    assert_eq!(client.get_sth().await.unwrap(), second);

    let proof = client.get_log_consistency_proof(first.tree_size, second.tree_size).await.unwrap();
    assert!(verify_consistency_proof(
        &first.log_root,
        &second.log_root,
        first.tree_size,
        second.tree_size,
        &proof
    ));

    let found = client.get_map_value(b"b", &second.map_root).await.unwrap();
    let map = SparseMap::new();
    let full = map.decompress_proof(&found.proof).unwrap();
    assert!(SparseMap::verify_proof(&full, &second.map_root, b"b", found.value.as_deref()));

    let absent = client.get_map_value(b"b", &first.map_root).await.unwrap();
    assert!(absent.value.is_none());

    let entries = client.get_log_entries(0, 2).await.unwrap();
    assert_eq!(entries.len(), 3);

    let err = client.submit(vec![(b"a".to_vec(), b"9".to_vec())]).await.unwrap_err();
    assert!(matches!(err, aggregator::ApiError::Remote { status: 409, .. }));
}
