//! Arbor Node - command propagation over a self-organizing tree
//!
//! A node accepts one command per inbound TCP connection, pushes it down
//! to its children, executes it locally and replies to the sender. A
//! joining node finds its parent through discovery and an INIT handshake.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod execute;
pub mod executor;
pub mod handler;
pub mod options;
pub mod runtime;
pub mod server;

pub use config::NodeConfig;
pub use context::NodeContext;
pub use envelope::Envelope;
pub use error::*;
pub use handler::{ConnectionHandler, Rejection};
pub use server::NodeServer;
