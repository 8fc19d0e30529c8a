use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use arbor_node::config::{DiscoveryBackend, NodeConfig, TopologyBackend};
use arbor_node::options::NodeOptions;
use arbor_node::runtime;
use arbor_state::{FileTopology, TopologyStore};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn base_config(dir: &Path, name: &str) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.network.listen_host = LOOPBACK;
    config.network.options_path = Some(dir.join(format!("{name}-options.json")));
    config.network.connect_timeout_ms = 2_000;
    config.network.io_timeout_ms = 5_000;
    config.discovery.backend = DiscoveryBackend::Static;
    config.discovery.advertise = false;
    config
}

/// Wait until the node has written a bound port to its options file.
async fn persisted_port(path: &Path, not: u16) -> u16 {
    for _ in 0..200 {
        if let Ok(raw) = std::fs::read_to_string(path) {
            if let Ok(options) = serde_json::from_str::<NodeOptions>(&raw) {
                if options.port != 0 && options.port != not {
                    return options.port;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("no port persisted in {}", path.display());
}

fn spawn_run(
    config: NodeConfig,
) -> (oneshot::Sender<()>, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(runtime::run(config, async move {
        let _ = rx.await;
    }));
    (tx, handle)
}

#[tokio::test]
async fn test_node_joins_master() {
    let dir = tempfile::tempdir().unwrap();
    let topology: PathBuf = dir.path().join("master-topology.json");

    let mut master = base_config(dir.path(), "master");
    master.node.master = true;
    master.node.topology = TopologyBackend::File;
    master.node.topology_path = Some(topology.clone());
    let (stop_master, master_task) = spawn_run(master);
    let master_port = persisted_port(&dir.path().join("master-options.json"), 0).await;

    let mut child = base_config(dir.path(), "child");
    child.discovery.peers = vec![format!("127.0.0.1:{master_port}")];
    let (stop_child, child_task) = spawn_run(child);
    let child_port = persisted_port(&dir.path().join("child-options.json"), 0).await;

    let mut admitted = Vec::new();
    for _ in 0..200 {
        admitted = FileTopology::open(&topology).unwrap().children().into_iter().collect();
        if !admitted.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].host, LOOPBACK);
    assert_eq!(admitted[0].port, child_port);

    stop_child.send(()).unwrap();
    stop_master.send(()).unwrap();
    child_task.await.unwrap().unwrap();
    master_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_required_parent_missing_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path(), "orphan");
    let (_stop, task) = spawn_run(config);

    let err = task.await.unwrap().unwrap_err();
    assert!(format!("{err:#}").contains("no candidates"));
}

#[tokio::test]
async fn test_optional_parent_runs_as_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path(), "root");
    config.node.require_parent = false;
    let (stop, task) = spawn_run(config);

    persisted_port(&dir.path().join("root-options.json"), 0).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_taken_port_falls_back_to_ephemeral() {
    let dir = tempfile::tempdir().unwrap();
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = occupied.local_addr().unwrap().port();

    let options_path = dir.path().join("busy-options.json");
    let stored = NodeOptions::new(LOOPBACK, taken, 1024);
    std::fs::write(&options_path, serde_json::to_string(&stored).unwrap()).unwrap();

    let mut config = base_config(dir.path(), "busy");
    config.node.master = true;
    let (stop, task) = spawn_run(config);

    let port = persisted_port(&options_path, taken).await;
    assert_ne!(port, taken);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
    drop(occupied);
}

#[tokio::test]
async fn test_wildcard_listen_host_needs_advertise_host() {
    let dir = tempfile::tempdir().unwrap();
    let occupied_master = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let master_port = occupied_master.local_addr().unwrap().port();

    let mut config = base_config(dir.path(), "wildcard");
    config.network.listen_host = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    config.discovery.peers = vec![format!("127.0.0.1:{master_port}")];
    let (_stop, task) = spawn_run(config);

    let err = task.await.unwrap().unwrap_err();
    assert!(format!("{err:#}").contains("advertise_host"), "got {err:#}");

    // Nothing was sent to the candidate.
    let accept = tokio::time::timeout(Duration::from_millis(100), occupied_master.accept()).await;
    assert!(accept.is_err());
}

#[tokio::test]
async fn test_advertise_host_used_in_init() {
    let dir = tempfile::tempdir().unwrap();
    let master = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let master_port = master.local_addr().unwrap().port();

    let mut config = base_config(dir.path(), "advertised");
    config.network.listen_host = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    config.network.advertise_host = Some(LOOPBACK);
    config.discovery.peers = vec![format!("127.0.0.1:{master_port}")];
    let (stop, task) = spawn_run(config);

    let (mut stream, _) = master.accept().await.unwrap();
    let mut buf = [0u8; 256];
    let n = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await.unwrap();
    let init = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(init.starts_with("0 INIT 127.0.0.1 "), "got {init}");
    tokio::io::AsyncWriteExt::write_all(&mut stream, b"OK").await.unwrap();
    drop(stream);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}
