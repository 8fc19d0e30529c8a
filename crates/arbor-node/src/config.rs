//! Node configuration loaded from TOML.
//!
//! Every section and field has a default, so an absent file or a partial
//! file is valid.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use arbor_network::TransportConfig;
use arbor_protocol::{Address, DEFAULT_BUFFER_SIZE};

use crate::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub network: NetworkSection,
    pub discovery: DiscoverySection,
    pub console: ConsoleSection,
    pub security: SecuritySection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Skip bootstrap and act as the tree root.
    pub master: bool,
    /// Discovery key naming the tree this node joins.
    pub resource_id: String,
    pub topology: TopologyBackend,
    pub topology_path: Option<PathBuf>,
    /// Abort startup when no parent can be acquired.
    pub require_parent: bool,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            master: false,
            resource_id: "arbor".to_string(),
            topology: TopologyBackend::Memory,
            topology_path: None,
            require_parent: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub listen_host: IpAddr,
    /// 0 binds an ephemeral port.
    pub listen_port: u16,
    /// Host announced to discovery and sent in INIT; defaults to `listen_host`.
    pub advertise_host: Option<IpAddr>,
    pub buffer_size: usize,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub max_connections: usize,
    pub options_path: Option<PathBuf>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 0,
            advertise_host: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout_ms: 5_000,
            io_timeout_ms: 60_000,
            max_connections: 256,
            options_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryBackend {
    #[default]
    Http,
    Dns,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub backend: DiscoveryBackend,
    /// Base URL of the HTTP lookup service.
    pub url: Option<String>,
    /// Domain holding `_arbor._tcp` TXT records.
    pub domain: Option<String>,
    /// Candidate parents for the static backend, as `ip:port`.
    pub peers: Vec<String>,
    pub timeout_ms: u64,
    /// Publish this node's address after startup.
    pub advertise: bool,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::Http,
            url: None,
            domain: None,
            peers: Vec::new(),
            timeout_ms: 5_000,
            advertise: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSection {
    pub shell: String,
    pub timeout_secs: u64,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self { shell: "sh".to_string(), timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Hex Ed25519 public key. When set, unsigned or badly signed
    /// payloads are dropped without a reply.
    pub verifying_key: Option<String>,
    /// Seed file used to sign messages this node originates.
    pub signing_key_path: Option<PathBuf>,
}

impl NodeConfig {
    /// `<config_dir>/arbor/node.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("arbor").join("node.toml"))
    }

    /// Load from `path`; a missing file yields defaults. Call
    /// [`NodeConfig::validate`] once command-line overrides are applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Toml { source, .. } => ConfigError::Toml {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Toml {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.buffer_size == 0 {
            return Err(ConfigError::Invalid("network.buffer_size must be positive".into()));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::Invalid("network.max_connections must be positive".into()));
        }
        if self.node.master {
            return Ok(());
        }
        match self.discovery.backend {
            DiscoveryBackend::Http if self.discovery.url.is_none() => Err(ConfigError::Invalid(
                "discovery.url is required for the http backend".into(),
            )),
            DiscoveryBackend::Dns if self.discovery.domain.is_none() => Err(ConfigError::Invalid(
                "discovery.domain is required for the dns backend".into(),
            )),
            _ => {
                self.static_peers()?;
                Ok(())
            }
        }
    }

    pub fn static_peers(&self) -> Result<Vec<Address>, ConfigError> {
        self.discovery
            .peers
            .iter()
            .map(|p| p.parse().map_err(|e| ConfigError::Invalid(format!("discovery.peers: {e}"))))
            .collect()
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            buffer_size: self.network.buffer_size,
            connect_timeout: Duration::from_millis(self.network.connect_timeout_ms),
            io_timeout: Duration::from_millis(self.network.io_timeout_ms),
        }
    }

    pub fn options_path(&self) -> PathBuf {
        self.network
            .options_path
            .clone()
            .unwrap_or_else(|| data_dir().join("network_options.json"))
    }

    pub fn topology_path(&self) -> PathBuf {
        self.node
            .topology_path
            .clone()
            .unwrap_or_else(|| data_dir().join("topology.json"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join("arbor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_discovery_url() {
        let config = NodeConfig::from_toml("").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_master_needs_no_discovery() {
        let config = NodeConfig::from_toml("[node]\nmaster = true\n").unwrap();
        config.validate().unwrap();
        assert!(config.node.master);
        assert_eq!(config.network.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.console.shell, "sh");
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            [node]
            resource_id = "tree-7"
            topology = "file"
            topology_path = "/tmp/arbor/topology.json"
            require_parent = false

            [network]
            listen_host = "127.0.0.1"
            listen_port = 9100
            buffer_size = 4096
            io_timeout_ms = 1500

            [discovery]
            backend = "static"
            peers = ["10.0.0.1:9100", "[::1]:9100"]
        "#;
        let config = NodeConfig::from_toml(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.node.topology, TopologyBackend::File);
        assert_eq!(config.network.listen_port, 9100);
        assert_eq!(config.static_peers().unwrap().len(), 2);
        let transport = config.transport_config();
        assert_eq!(transport.buffer_size, 4096);
        assert_eq!(transport.io_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_static_peer_rejected() {
        let raw = "[discovery]\nbackend = \"static\"\npeers = [\"nope\"]\n";
        assert!(NodeConfig::from_toml(raw).unwrap().validate().is_err());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let raw = "[node]\nmaster = true\n[network]\nbuffer_size = 0\n";
        assert!(NodeConfig::from_toml(raw).unwrap().validate().is_err());
    }
}
