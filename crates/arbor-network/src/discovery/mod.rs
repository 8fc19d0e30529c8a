//! Peer discovery: resource identifier -> candidate addresses.

mod dns;
mod http;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use arbor_protocol::Address;

use crate::DiscoveryError;

pub use dns::{parse_bootstrap_txt_record, DnsDiscovery};
pub use http::HttpDiscovery;

pub type DiscoveryFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lookup service mapping an opaque resource identifier to peer addresses.
pub trait Discovery: Send + Sync {
    /// Candidate peers under `resource_id`. Backend failures yield an empty set.
    fn get_peers<'a>(&'a self, resource_id: &'a str) -> DiscoveryFuture<'a, HashSet<Address>>;

    /// Advertise `peers` under `resource_id`.
    fn add_peers<'a>(
        &'a self,
        peers: &'a HashSet<Address>,
        resource_id: &'a str,
    ) -> DiscoveryFuture<'a, Result<(), DiscoveryError>>;
}

/// Fixed peer list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    peers: HashSet<Address>,
}

impl StaticDiscovery {
    pub fn new(peers: impl IntoIterator<Item = Address>) -> Self {
        Self { peers: peers.into_iter().collect() }
    }
}

impl Discovery for StaticDiscovery {
    fn get_peers<'a>(&'a self, _resource_id: &'a str) -> DiscoveryFuture<'a, HashSet<Address>> {
        Box::pin(async move { self.peers.clone() })
    }

    fn add_peers<'a>(
        &'a self,
        _peers: &'a HashSet<Address>,
        _resource_id: &'a str,
    ) -> DiscoveryFuture<'a, Result<(), DiscoveryError>> {
        Box::pin(async { Err(DiscoveryError::Unsupported("static")) })
    }
}
