//! Process wiring: configuration in, running node out.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use arbor_network::{Discovery, DnsDiscovery, HttpDiscovery, StaticDiscovery, Transport};
use arbor_protocol::crypto::{load_or_create_keypair, Ed25519Verifier};
use arbor_protocol::Address;
use arbor_state::{FileTopology, MemoryTopology, TopologyStore};

use crate::bootstrap::{acquire_parent, needs_parent};
use crate::config::{DiscoveryBackend, NodeConfig, TopologyBackend};
use crate::context::NodeContext;
use crate::executor::ShellExecutor;
use crate::options::{NodeOptions, PersistedOptions};
use crate::server::NodeServer;
use crate::ConfigError;

/// Start the listener, acquire a parent, advertise, then serve until
/// `shutdown` resolves.
pub async fn run(
    config: NodeConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), anyhow::Error> {
    config.validate()?;

    let mut options = PersistedOptions::load_or_create(
        config.options_path(),
        NodeOptions::new(
            config.network.listen_host,
            config.network.listen_port,
            config.network.buffer_size,
        ),
    )?;
    let ctx = build_context(&config)?;
    let discovery = build_discovery(&config)?;

    let bootstrap = needs_parent(ctx.store.as_ref(), config.node.master);
    let self_host = config.network.advertise_host.unwrap_or(options.options().host);
    if bootstrap && self_host.is_unspecified() {
        return Err(ConfigError::Invalid(format!(
            "cannot join a tree as {self_host}; set network.advertise_host or a concrete network.listen_host"
        ))
        .into());
    }

    let server = bind_server(&config, &mut options, ctx.clone()).await?;
    let me = Address::new(self_host, server.local_addr()?.port());
    let server_task = tokio::spawn(server.run_until(shutdown));

    if bootstrap {
        let discovery = discovery
            .as_deref()
            .context("bootstrap requires a discovery backend")?;
        if let Err(e) = acquire_parent(discovery, &ctx, me, &config.node.resource_id).await {
            if config.node.require_parent {
                server_task.abort();
                return Err(e).context("bootstrap failed");
            }
            tracing::warn!(error = %e, "No parent acquired, running as root");
        }
    }

    if config.discovery.advertise {
        if let Some(discovery) = discovery.as_deref() {
            advertise(discovery, me, &config.node.resource_id).await;
        }
    }

    server_task.await.context("listener task panicked")?
}

pub fn build_context(config: &NodeConfig) -> Result<NodeContext, ConfigError> {
    let store: Arc<dyn TopologyStore> = match config.node.topology {
        TopologyBackend::Memory => Arc::new(MemoryTopology::new()),
        TopologyBackend::File => Arc::new(
            FileTopology::open(config.topology_path())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        ),
    };
    let executor = ShellExecutor::new(
        config.console.shell.clone(),
        Duration::from_secs(config.console.timeout_secs),
    );
    let mut ctx = NodeContext::new(
        store,
        Transport::new(config.transport_config()),
        Arc::new(executor),
    );

    if let Some(hex_key) = &config.security.verifying_key {
        let verifier = Ed25519Verifier::from_hex(hex_key)
            .map_err(|e| ConfigError::Invalid(format!("security.verifying_key: {e}")))?;
        ctx = ctx.with_verifier(Arc::new(verifier));
    }
    if let Some(path) = &config.security.signing_key_path {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "security.signing_key_path {} does not exist",
                path.display()
            )));
        }
        let key = load_or_create_keypair(path)
            .map_err(|e| ConfigError::Invalid(format!("security.signing_key_path: {e}")))?;
        ctx = ctx.with_signer(Arc::new(key));
    }
    Ok(ctx)
}

pub fn build_discovery(config: &NodeConfig) -> Result<Option<Box<dyn Discovery>>, ConfigError> {
    let timeout = Duration::from_millis(config.discovery.timeout_ms);
    let discovery: Option<Box<dyn Discovery>> = match config.discovery.backend {
        DiscoveryBackend::Http => match &config.discovery.url {
            Some(url) => Some(Box::new(
                HttpDiscovery::new(url.clone(), timeout)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            )),
            None => None,
        },
        DiscoveryBackend::Dns => config
            .discovery
            .domain
            .as_ref()
            .map(|domain| Box::new(DnsDiscovery::new(domain.clone())) as Box<dyn Discovery>),
        DiscoveryBackend::Static => Some(Box::new(StaticDiscovery::new(config.static_peers()?))),
    };
    Ok(discovery)
}

/// Bind the persisted address, falling back to an ephemeral port when it
/// is taken. The bound port is written back.
async fn bind_server(
    config: &NodeConfig,
    options: &mut PersistedOptions,
    ctx: NodeContext,
) -> Result<NodeServer, anyhow::Error> {
    let max = config.network.max_connections;
    let wanted = options.options().address();

    let server = match NodeServer::bind(wanted.socket_addr(), ctx.clone(), max).await {
        Ok(server) => server,
        Err(e) if wanted.port != 0 => {
            tracing::warn!(addr = %wanted, error = %e, "Persisted port unavailable, binding an ephemeral port");
            options.change_port(0)?;
            let fallback = options.options().address();
            NodeServer::bind(fallback.socket_addr(), ctx, max)
                .await
                .with_context(|| format!("failed to bind {fallback}"))?
        }
        Err(e) => return Err(e).with_context(|| format!("failed to bind {wanted}")),
    };

    let bound = server.local_addr()?.port();
    if bound != options.options().port {
        options.change_port(bound)?;
        tracing::info!(port = bound, path = %options.path().display(), "Persisted listen port");
    }
    Ok(server)
}

async fn advertise(discovery: &dyn Discovery, me: Address, resource_id: &str) {
    if me.host.is_unspecified() {
        tracing::warn!(addr = %me, "Not advertising an unspecified address; set network.advertise_host");
        return;
    }
    let peers: HashSet<Address> = [me].into();
    match discovery.add_peers(&peers, resource_id).await {
        Ok(()) => tracing::info!(addr = %me, resource = %resource_id, "Address advertised"),
        Err(e) => tracing::warn!(error = %e, "Failed to advertise address"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_without_url_has_no_discovery() {
        let mut config = NodeConfig::default();
        config.node.master = true;
        assert!(build_discovery(&config).unwrap().is_none());
    }

    #[test]
    fn test_static_discovery_built_from_peers() {
        let mut config = NodeConfig::default();
        config.discovery.backend = DiscoveryBackend::Static;
        config.discovery.peers = vec!["10.0.0.1:4000".into()];
        assert!(build_discovery(&config).unwrap().is_some());

        config.discovery.peers = vec!["nonsense".into()];
        assert!(build_discovery(&config).is_err());
    }

    #[test]
    fn test_bad_verifying_key_rejected() {
        let mut config = NodeConfig::default();
        config.security.verifying_key = Some("zz".into());
        assert!(matches!(build_context(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_signing_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::default();
        config.security.signing_key_path = Some(dir.path().join("absent.key"));
        assert!(matches!(build_context(&config), Err(ConfigError::Invalid(_))));
        assert!(!dir.path().join("absent.key").exists());
    }

    #[test]
    fn test_context_carries_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("node.key");
        let key = load_or_create_keypair(&key_path).unwrap();

        let mut config = NodeConfig::default();
        config.security.verifying_key = Some(hex::encode(key.verifying_key().to_bytes()));
        config.security.signing_key_path = Some(key_path);
        let ctx = build_context(&config).unwrap();
        assert!(ctx.verifier.is_some());
        assert!(ctx.signer.is_some());
    }
}
