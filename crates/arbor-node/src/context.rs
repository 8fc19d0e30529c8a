use std::sync::Arc;

use arbor_network::Transport;
use arbor_protocol::crypto::{sign_wire, MessageVerifier, SigningKey};
use arbor_state::TopologyStore;

use crate::executor::LocalExecutor;

/// Collaborators shared by every connection handler.
///
/// Built once at startup; cloning only bumps reference counts.
#[derive(Clone)]
pub struct NodeContext {
    pub store: Arc<dyn TopologyStore>,
    pub transport: Transport,
    pub executor: Arc<dyn LocalExecutor>,
    /// Authenticity check for inbound payloads; `None` disables it.
    pub verifier: Option<Arc<dyn MessageVerifier>>,
    /// Signs messages this node originates (bootstrap INIT, relayed reports).
    pub signer: Option<Arc<SigningKey>>,
}

impl NodeContext {
    pub fn new(
        store: Arc<dyn TopologyStore>,
        transport: Transport,
        executor: Arc<dyn LocalExecutor>,
    ) -> Self {
        Self { store, transport, executor, verifier: None, signer: None }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn MessageVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_signer(mut self, signer: Arc<SigningKey>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Wire text for a message originated here, signed when a key is set.
    pub fn seal(&self, message: &str) -> String {
        match &self.signer {
            Some(key) => sign_wire(key, message),
            None => message.to_string(),
        }
    }
}
