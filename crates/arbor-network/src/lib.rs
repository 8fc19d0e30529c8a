//! Arbor Network - transport client and peer discovery
//!
//! Every command travels over a fresh TCP connection: one request, one
//! response, then close. Candidate parents are found through a pluggable
//! [`discovery::Discovery`] backend.

pub mod discovery;
pub mod error;
pub mod transport;

pub use discovery::{Discovery, DnsDiscovery, HttpDiscovery, StaticDiscovery};
pub use error::{DiscoveryError, NetworkError};
pub use transport::{Transport, TransportConfig};
