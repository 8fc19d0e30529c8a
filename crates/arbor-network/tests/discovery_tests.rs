use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbor_network::discovery::parse_bootstrap_txt_record;
use arbor_network::{Discovery, DiscoveryError, HttpDiscovery, StaticDiscovery};
use arbor_protocol::Address;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

type Posted = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn list_peers(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    if q.get("hash").map(String::as_str) == Some("tree-1") {
        Json(serde_json::json!([
            {"host": "10.0.0.1", "port": 9000},
            {"host": "10.0.0.2", "port": 9001},
            {"host": "not-an-ip", "port": 1}
        ]))
    } else {
        Json(serde_json::json!([]))
    }
}

async fn add_peer(
    State(posted): State<Posted>,
    Query(q): Query<HashMap<String, String>>,
) -> &'static str {
    let accepted = q.get("hash").map(String::as_str) == Some("tree-1");
    posted.lock().unwrap().push(q);
    if accepted { "OK" } else { "NO" }
}

async fn spawn_registry() -> (String, Posted) {
    let posted: Posted = Arc::default();
    let app = Router::new()
        .route("/peers", get(list_peers).post(add_peer))
        .with_state(Arc::clone(&posted));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (url, posted)
}

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_http_get_peers() {
    let (url, _) = spawn_registry().await;
    let discovery = HttpDiscovery::new(url, Duration::from_secs(2)).unwrap();
    let peers = discovery.get_peers("tree-1").await;
    let expected: HashSet<Address> = [addr("10.0.0.1:9000"), addr("10.0.0.2:9001")].into();
    assert_eq!(peers, expected, "invalid hosts are skipped");
    assert!(discovery.get_peers("other").await.is_empty());
}

#[tokio::test]
async fn test_http_unreachable_yields_no_peers() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let discovery = HttpDiscovery::new(url, Duration::from_millis(500)).unwrap();
    assert!(discovery.get_peers("tree-1").await.is_empty());
}

#[tokio::test]
async fn test_http_add_peers() {
    let (url, posted) = spawn_registry().await;
    let discovery = HttpDiscovery::new(format!("{url}/"), Duration::from_secs(2)).unwrap();
    let me: HashSet<Address> = [addr("10.0.0.9:7000")].into();

    discovery.add_peers(&me, "tree-1").await.unwrap();
    {
        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0]["host"], "10.0.0.9");
        assert_eq!(posted[0]["port"], "7000");
    }

    let err = discovery.add_peers(&me, "tree-2").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Rejected { failed: 1, total: 1 }));
}

#[tokio::test]
async fn test_static_discovery() {
    let discovery = StaticDiscovery::new([addr("10.0.0.1:1"), addr("10.0.0.1:1")]);
    assert_eq!(discovery.get_peers("any").await.len(), 1);
    assert!(discovery.add_peers(&HashSet::new(), "any").await.is_err());
}

#[test]
fn test_parse_dns_txt_record_valid() {
    let peer = parse_bootstrap_txt_record("v=1 peer=203.0.113.7:9000").unwrap();
    assert_eq!(peer, addr("203.0.113.7:9000"));
}

#[test]
fn test_parse_dns_txt_record_invalid() {
    assert!(parse_bootstrap_txt_record("v=1 garbage").is_err());
    assert!(parse_bootstrap_txt_record("v=2 peer=1.2.3.4:1").is_err());
    assert!(parse_bootstrap_txt_record("peer=1.2.3.4:1").is_err());
    assert!(parse_bootstrap_txt_record("v=1 peer=example.com:80").is_err());
}
