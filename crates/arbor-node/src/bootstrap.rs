//! Parent acquisition for a joining node.

use rand::seq::SliceRandom;

use arbor_network::{Discovery, Transport};
use arbor_protocol::{Address, Command, InitCommand, BOOTSTRAP_HASH, REPLY_OK};
use arbor_state::TopologyStore;

use crate::context::NodeContext;
use crate::BootstrapError;

/// Find a parent through `discovery` and record it in the store.
///
/// Candidates are tried in random order with an INIT naming `me`; the
/// first one answering `OK` becomes the parent and the search stops.
pub async fn acquire_parent(
    discovery: &dyn Discovery,
    ctx: &NodeContext,
    me: Address,
    resource_id: &str,
) -> Result<Address, BootstrapError> {
    // A wildcard host in INIT would make the parent dial itself.
    if me.host.is_unspecified() {
        return Err(BootstrapError::UnspecifiedAddress(me));
    }
    let mut candidates: Vec<Address> = discovery
        .get_peers(resource_id)
        .await
        .into_iter()
        .filter(|c| *c != me)
        .collect();
    if candidates.is_empty() {
        return Err(BootstrapError::NoCandidates(resource_id.to_string()));
    }
    candidates.shuffle(&mut rand::thread_rng());

    let init = Command::from(InitCommand::new(BOOTSTRAP_HASH, me));
    let text = ctx.seal(&init.to_string());
    let parent = try_candidates(&ctx.transport, &candidates, &text).await?;

    ctx.store.set_parent(parent);
    tracing::info!(parent = %parent, "Parent acquired");
    Ok(parent)
}

async fn try_candidates(
    transport: &Transport,
    candidates: &[Address],
    text: &str,
) -> Result<Address, BootstrapError> {
    for candidate in candidates {
        tracing::debug!(candidate = %candidate, "Sending INIT");
        match transport.send_message_to(*candidate, text).await {
            Ok(reply) if reply.trim() == REPLY_OK => return Ok(*candidate),
            Ok(reply) => {
                tracing::info!(candidate = %candidate, reply = %reply.trim(), "INIT declined");
            }
            Err(e) => {
                tracing::info!(candidate = %candidate, error = %e, "Candidate unreachable");
            }
        }
    }
    Err(BootstrapError::Exhausted { tried: candidates.len() })
}

/// Whether this node should run bootstrap at all.
pub fn needs_parent(store: &dyn TopologyStore, master: bool) -> bool {
    !master && store.parent().is_none()
}
