//! Local effect of each command variant.

use rand::seq::SliceRandom;

use arbor_protocol::{
    AddChildCommand, Command, ConsoleCommand, ReportCommand, REPLY_ALREADY, REPLY_OK,
};

use crate::context::NodeContext;
use crate::envelope::Envelope;

/// Run the command against this node and return the reply payload.
pub async fn execute(envelope: &Envelope, ctx: &NodeContext) -> String {
    match &envelope.command {
        Command::Console(console) => run_console(console, ctx).await,
        Command::Init(init) => {
            if ctx.store.add_child(init.child) {
                tracing::info!(child = %init.child, "Child admitted");
                REPLY_OK.to_string()
            } else {
                REPLY_ALREADY.to_string()
            }
        }
        Command::AddChild(add) => add_child(add, envelope, ctx),
        Command::Report(report) => relay_report(report, envelope, ctx).await,
    }
}

async fn run_console(console: &ConsoleCommand, ctx: &NodeContext) -> String {
    let line = console.line();
    tracing::info!(hash = %console.hash, line = %line, "Executing console command");
    let output = match ctx.executor.run(&line).await {
        Ok(stdout) => stdout,
        Err(failure) => failure,
    };
    truncate_utf8(output, ctx.transport.config().buffer_size)
}

/// Hand the command to one random existing child, then admit the new one.
fn add_child(add: &AddChildCommand, envelope: &Envelope, ctx: &NodeContext) -> String {
    let target = {
        let candidates: Vec<_> = ctx
            .store
            .children()
            .into_iter()
            .filter(|c| *c != add.child)
            .collect();
        candidates.choose(&mut rand::thread_rng()).copied()
    };

    if let Some(target) = target {
        let transport = ctx.transport.clone();
        let text = envelope.forward_text();
        tokio::spawn(async move {
            match transport.send_message_to(target, &text).await {
                Ok(reply) => tracing::debug!(peer = %target, reply = %reply, "ADD_CHILD handed down"),
                Err(e) => tracing::debug!(peer = %target, error = %e, "ADD_CHILD hand-down failed"),
            }
        });
    }

    ctx.store.add_child(add.child);
    REPLY_OK.to_string()
}

async fn relay_report(report: &ReportCommand, envelope: &Envelope, ctx: &NodeContext) -> String {
    match ctx.store.parent() {
        Some(parent) => {
            if let Err(e) = ctx.transport.send_message_to(parent, &envelope.forward_text()).await {
                tracing::warn!(parent = %parent, error = %e, "Failed to relay report");
            }
        }
        None => tracing::info!(hash = %report.hash, text = %report.text, "Report received"),
    }
    String::new()
}

/// Cut `s` to at most `max` bytes on a character boundary.
pub fn truncate_utf8(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}
