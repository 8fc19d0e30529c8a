use arbor_protocol::{Command, SIGNATURE_SEPARATOR};

/// A decoded inbound command plus what is needed to pass it on verbatim.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub command: Command,
    /// The message text as received, without the signature suffix.
    pub message: String,
    pub signature: Option<String>,
}

impl Envelope {
    pub fn unsigned(command: Command) -> Self {
        let message = command.to_string();
        Self { command, message, signature: None }
    }

    /// Text sent when forwarding this command to another node.
    ///
    /// Unsigned commands travel in canonical wire form. Signed ones keep
    /// the original message bytes so the signature still verifies.
    pub fn forward_text(&self) -> String {
        match &self.signature {
            Some(sig) => format!("{}{SIGNATURE_SEPARATOR}{sig}", self.message),
            None => self.command.to_string(),
        }
    }
}
