//! DNS TXT record bootstrap discovery.
//!
//! Queries `_arbor._tcp.<domain>` for TXT records listing candidate
//! parents. Format:
//!   "v=1 peer=203.0.113.7:9000"

use std::collections::{HashMap, HashSet};

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

use arbor_protocol::Address;

use super::{Discovery, DiscoveryFuture};
use crate::DiscoveryError;

/// Parse a single DNS TXT bootstrap record.
/// Format: "v=1 peer=<ip>:<port>"
pub fn parse_bootstrap_txt_record(record: &str) -> Result<Address, DiscoveryError> {
    let parts: HashMap<&str, &str> = record
        .split_whitespace()
        .filter_map(|kv| kv.split_once('='))
        .collect();

    let version = parts.get("v").copied().unwrap_or("");
    if version != "1" {
        return Err(DiscoveryError::InvalidRecord(format!(
            "unsupported or missing version: '{version}'"
        )));
    }

    let peer = parts
        .get("peer")
        .copied()
        .ok_or_else(|| DiscoveryError::InvalidRecord("missing 'peer' field".into()))?;

    peer.parse::<Address>()
        .map_err(|e| DiscoveryError::InvalidRecord(e.to_string()))
}

/// Read-only discovery over DNS TXT records. The resource identifier is
/// not part of the query; the domain selects the tree.
pub struct DnsDiscovery {
    domain: String,
    resolver: TokioAsyncResolver,
}

impl DnsDiscovery {
    pub fn new(domain: impl Into<String>) -> Self {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self { domain: domain.into(), resolver }
    }

    pub fn record_name(&self) -> String {
        format!("_arbor._tcp.{}", self.domain)
    }
}

impl Discovery for DnsDiscovery {
    fn get_peers<'a>(&'a self, _resource_id: &'a str) -> DiscoveryFuture<'a, HashSet<Address>> {
        Box::pin(async move {
            let txt_name = self.record_name();
            match self.resolver.txt_lookup(txt_name.as_str()).await {
                Ok(records) => records
                    .iter()
                    .filter_map(|rdata| {
                        let combined: String = rdata
                            .txt_data()
                            .iter()
                            .map(|chunk| String::from_utf8_lossy(chunk))
                            .collect();
                        match parse_bootstrap_txt_record(&combined) {
                            Ok(addr) => Some(addr),
                            Err(e) => {
                                tracing::debug!(record = %combined, error = %e, "Ignoring TXT record");
                                None
                            }
                        }
                    })
                    .collect(),
                Err(e) => {
                    tracing::debug!("DNS bootstrap lookup failed for {txt_name}: {e}");
                    HashSet::new()
                }
            }
        })
    }

    fn add_peers<'a>(
        &'a self,
        _peers: &'a HashSet<Address>,
        _resource_id: &'a str,
    ) -> DiscoveryFuture<'a, Result<(), DiscoveryError>> {
        Box::pin(async { Err(DiscoveryError::Unsupported("dns")) })
    }
}
