//! HTTP discovery backend.
//!
//! - `GET  <base>/peers?hash=<resource>` returns `[{"host": .., "port": ..}, ..]`
//! - `POST <base>/peers?host=<ip>&port=<port>&hash=<resource>` answers `OK`

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use arbor_protocol::{Address, REPLY_OK};

use super::{Discovery, DiscoveryFuture};
use crate::DiscoveryError;

#[derive(Debug, Deserialize)]
struct PeerRecord {
    host: String,
    port: u16,
}

pub struct HttpDiscovery {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDiscovery {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Request(format!("build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    fn peers_url(&self) -> String {
        format!("{}/peers", self.base_url)
    }

    async fn fetch(&self, resource_id: &str) -> Result<HashSet<Address>, DiscoveryError> {
        let url = self.peers_url();
        tracing::debug!(url = %url, resource = %resource_id, "Querying discovery service");

        let response = self
            .client
            .get(&url)
            .query(&[("hash", resource_id)])
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Request(format!("status {}", response.status())));
        }

        let records: Vec<PeerRecord> = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Request(format!("malformed peer list: {e}")))?;

        let peers = records
            .into_iter()
            .filter_map(|r| match r.host.parse() {
                Ok(host) => Some(Address::new(host, r.port)),
                Err(_) => {
                    tracing::debug!(host = %r.host, "Skipping peer with invalid host");
                    None
                }
            })
            .collect();
        Ok(peers)
    }

    async fn advertise(&self, peer: &Address, resource_id: &str) -> Result<(), DiscoveryError> {
        let response = self
            .client
            .post(self.peers_url())
            .query(&[
                ("host", peer.host.to_string()),
                ("port", peer.port.to_string()),
                ("hash", resource_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;
        if !status.is_success() || body.trim() != REPLY_OK {
            return Err(DiscoveryError::Request(format!("status {status}, body '{}'", body.trim())));
        }
        Ok(())
    }
}

impl Discovery for HttpDiscovery {
    fn get_peers<'a>(&'a self, resource_id: &'a str) -> DiscoveryFuture<'a, HashSet<Address>> {
        Box::pin(async move {
            match self.fetch(resource_id).await {
                Ok(peers) => {
                    tracing::info!(count = peers.len(), "Discovery returned peers");
                    peers
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Peer lookup failed");
                    HashSet::new()
                }
            }
        })
    }

    fn add_peers<'a>(
        &'a self,
        peers: &'a HashSet<Address>,
        resource_id: &'a str,
    ) -> DiscoveryFuture<'a, Result<(), DiscoveryError>> {
        Box::pin(async move {
            let mut failed = 0;
            for peer in peers {
                if let Err(e) = self.advertise(peer, resource_id).await {
                    tracing::warn!(peer = %peer, error = %e, "Peer not added");
                    failed += 1;
                }
            }
            if failed > 0 {
                return Err(DiscoveryError::Rejected { failed, total: peers.len() });
            }
            Ok(())
        })
    }
}
