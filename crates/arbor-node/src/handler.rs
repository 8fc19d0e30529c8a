//! Per-connection protocol engine.
//!
//! One inbound connection carries one command through:
//! receive -> authenticate -> decode -> dedup -> authorize -> forward ->
//! execute -> reply. Any rejection ends the connection early.

use futures::future::join_all;
use thiserror::Error;
use tokio::net::TcpStream;

use arbor_protocol::crypto::split_signed;
use arbor_protocol::{
    Address, Command, ProtocolError, ReportCommand, REPLY_DUPLICATE, REPLY_NOT_SUPPORTED,
    REPLY_UNSUPPORTED, WIRE_DELIMITER,
};

use crate::context::NodeContext;
use crate::envelope::Envelope;
use crate::execute::execute;

/// Why a command was not executed.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("authenticity check failed")]
    Unauthenticated,

    #[error("unsupported command: {0}")]
    Unsupported(#[from] ProtocolError),

    #[error("command already executed")]
    Duplicate,

    #[error("peer {peer} is not allowed to send {command}")]
    Unauthorized { peer: Address, command: &'static str },
}

impl Rejection {
    /// Text sent back to the peer. Authenticity failures get no reply.
    pub fn reply(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => None,
            Self::Unsupported(_) => Some(REPLY_UNSUPPORTED),
            Self::Duplicate => Some(REPLY_DUPLICATE),
            Self::Unauthorized { .. } => Some(REPLY_NOT_SUPPORTED),
        }
    }
}

pub struct ConnectionHandler {
    ctx: NodeContext,
    stream: TcpStream,
    peer: Address,
}

impl ConnectionHandler {
    pub fn new(ctx: NodeContext, stream: TcpStream, peer: Address) -> Self {
        Self { ctx, stream, peer }
    }

    /// Drive the connection to completion. Errors are logged, never raised.
    pub async fn run(mut self) {
        let raw = match self.ctx.transport.receive(&mut self.stream).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "Failed to read request");
                return;
            }
        };

        let reply = match self.process(raw.trim()).await {
            Ok(result) => result,
            Err(rejection) => {
                tracing::info!(peer = %self.peer, reason = %rejection, "Command rejected");
                match rejection.reply() {
                    Some(text) => text.to_string(),
                    None => return,
                }
            }
        };

        if let Err(e) = self.ctx.transport.direct_reply(&mut self.stream, &reply).await {
            tracing::debug!(peer = %self.peer, error = %e, "Failed to send reply");
        }
    }

    /// Everything between receive and reply.
    pub async fn process(&self, payload: &str) -> Result<String, Rejection> {
        let envelope = self.decode(payload)?;
        self.check_duplicate(&envelope.command)?;
        self.authorize(&envelope.command)?;

        tracing::debug!(
            peer = %self.peer,
            hash = %envelope.command.hash(),
            kind = %envelope.command.kind(),
            "Command accepted"
        );

        if !matches!(envelope.command, Command::Init(_)) {
            forward_to_children(&self.ctx, &envelope).await;
        }
        Ok(execute(&envelope, &self.ctx).await)
    }

    fn decode(&self, payload: &str) -> Result<Envelope, Rejection> {
        let (message, signature) = match &self.ctx.verifier {
            None => (payload, None),
            Some(verifier) => {
                let (message, signature) = split_signed(payload).ok_or(Rejection::Unauthenticated)?;
                if !verifier.verify(message.as_bytes(), signature) {
                    return Err(Rejection::Unauthenticated);
                }
                (message, Some(signature.to_string()))
            }
        };

        let command = Command::parse(message, WIRE_DELIMITER)?;
        Ok(Envelope { command, message: message.to_string(), signature })
    }

    /// Claims the digest before anything runs, so concurrent duplicates
    /// see it as taken.
    fn check_duplicate(&self, command: &Command) -> Result<(), Rejection> {
        if self.ctx.store.mark_seen(&command.digest()) {
            Ok(())
        } else {
            Err(Rejection::Duplicate)
        }
    }

    fn authorize(&self, command: &Command) -> Result<(), Rejection> {
        let Some(parent) = self.ctx.store.parent() else {
            return Ok(());
        };

        let allowed = match command {
            Command::Init(init) => self.peer != parent && init.child != parent,
            _ => self.peer.same_host(&parent),
        };
        if allowed {
            Ok(())
        } else {
            Err(Rejection::Unauthorized { peer: self.peer, command: command.kind().keyword() })
        }
    }
}

/// Push the command to every child concurrently.
///
/// A child answering with the rejection sentinel no longer treats this
/// node as its parent and is pruned. Unreachable children are skipped but
/// kept. When this node has a parent, each remaining child reply is
/// reported upward.
pub async fn forward_to_children(ctx: &NodeContext, envelope: &Envelope) {
    let children = ctx.store.children();
    if children.is_empty() {
        return;
    }

    let text = envelope.forward_text();
    let sends = children.into_iter().map(|child| {
        let text = &text;
        async move {
            match ctx.transport.send_message_to(child, text).await {
                Ok(reply) if reply.trim() == REPLY_NOT_SUPPORTED => {
                    ctx.store.remove_child(&child);
                    tracing::info!(child = %child, "Child rejected command, pruned");
                }
                Ok(reply) => relay_child_reply(ctx, envelope, child, reply).await,
                Err(e) => {
                    tracing::debug!(child = %child, error = %e, "Child unreachable, skipped");
                }
            }
        }
    });
    join_all(sends).await;
}

async fn relay_child_reply(ctx: &NodeContext, envelope: &Envelope, child: Address, reply: String) {
    let Some(parent) = ctx.store.parent() else {
        return;
    };
    let hash = format!("{}:{}", envelope.command.hash(), child);
    let report = Command::from(ReportCommand::new(hash, reply.trim()));
    if let Err(e) = ctx.transport.send_message_to(parent, &ctx.seal(&report.to_string())).await {
        tracing::debug!(parent = %parent, error = %e, "Failed to relay child reply");
    }
}
