use arbor_protocol::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no destination configured")]
    NoDestination,

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: Address,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u128 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for discovery backend failures.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery backend '{0}' does not support advertising peers")]
    Unsupported(&'static str),

    #[error("discovery request failed: {0}")]
    Request(String),

    #[error("{failed} of {total} peers were not advertised")]
    Rejected { failed: usize, total: usize },

    #[error("invalid bootstrap record: {0}")]
    InvalidRecord(String),
}
