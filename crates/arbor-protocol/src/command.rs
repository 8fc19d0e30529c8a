//! Command model: a closed set of wire commands.
//!
//! Wire form is `"<hash> <KEYWORD> <arg>..."`. Keywords are matched exactly
//! and case-insensitively; anything else is rejected as unknown.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::constants::WIRE_DELIMITER;
use crate::crypto::compute_digest;
use crate::types::Address;
use crate::ProtocolError;

/// Keyword identifying a command variant on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Console,
    Init,
    AddChild,
    Report,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Console,
        CommandKind::Init,
        CommandKind::AddChild,
        CommandKind::Report,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Console => "CONSOLE",
            Self::Init => "INIT",
            Self::AddChild => "ADD_CHILD",
            Self::Report => "REPORT",
        }
    }

    /// Exact, case-insensitive keyword lookup. Prefixes do not match.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Run a line on the local execution facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleCommand {
    pub hash: String,
    pub args: Vec<String>,
}

impl ConsoleCommand {
    pub fn new(hash: impl Into<String>, args: Vec<String>) -> Self {
        Self { hash: hash.into(), args }
    }

    /// The shell line: arguments joined by single spaces.
    pub fn line(&self) -> String {
        self.args.join(" ")
    }
}

/// Ask the receiving node to admit `child` beneath itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCommand {
    pub hash: String,
    pub child: Address,
}

impl InitCommand {
    pub fn new(hash: impl Into<String>, child: Address) -> Self {
        Self { hash: hash.into(), child }
    }
}

/// Add `child` to the tree below the receiving node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddChildCommand {
    pub hash: String,
    pub child: Address,
}

impl AddChildCommand {
    pub fn new(hash: impl Into<String>, child: Address) -> Self {
        Self { hash: hash.into(), child }
    }
}

/// Free-form text travelling towards the root.
/// Free-form status text travelling toward the root.
///
/// The text is stored trimmed: the wire form cannot carry leading or
/// trailing whitespace, so neither does the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCommand {
    pub hash: String,
    pub text: String,
}

impl ReportCommand {
    pub fn new(hash: impl Into<String>, text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self { hash: hash.into(), text: text.trim().to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Console(ConsoleCommand),
    Init(InitCommand),
    AddChild(AddChildCommand),
    Report(ReportCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Console(_) => CommandKind::Console,
            Self::Init(_) => CommandKind::Init,
            Self::AddChild(_) => CommandKind::AddChild,
            Self::Report(_) => CommandKind::Report,
        }
    }

    /// The sender-supplied hash field.
    pub fn hash(&self) -> &str {
        match self {
            Self::Console(c) => &c.hash,
            Self::Init(c) => &c.hash,
            Self::AddChild(c) => &c.hash,
            Self::Report(c) => &c.hash,
        }
    }

    /// Parse raw wire text split on `delimiter`.
    ///
    /// An empty delimiter falls back to [`WIRE_DELIMITER`].
    pub fn parse(raw: &str, delimiter: &str) -> Result<Self, ProtocolError> {
        let delimiter = if delimiter.is_empty() { WIRE_DELIMITER } else { delimiter };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let (hash, rest) = next_token(raw, delimiter);
        let (keyword, rest) = next_token(rest, delimiter);
        if keyword.is_empty() {
            return Err(ProtocolError::MissingField { kind: "command", field: "keyword" });
        }
        let rest = rest.trim_start_matches(delimiter);

        let kind = CommandKind::from_keyword(keyword)
            .ok_or_else(|| ProtocolError::UnknownKeyword(keyword.to_string()))?;
        let mut tokens = rest.split(delimiter).filter(|t| !t.is_empty());

        let command = match kind {
            CommandKind::Console => {
                let args: Vec<String> = tokens.map(str::to_string).collect();
                if args.is_empty() {
                    return Err(ProtocolError::MissingField { kind: "CONSOLE", field: "args" });
                }
                Self::Console(ConsoleCommand::new(hash, args))
            }
            CommandKind::Init => {
                Self::Init(InitCommand::new(hash, parse_child(&mut tokens, "INIT")?))
            }
            CommandKind::AddChild => {
                Self::AddChild(AddChildCommand::new(hash, parse_child(&mut tokens, "ADD_CHILD")?))
            }
            CommandKind::Report => Self::Report(ReportCommand::new(hash, rest)),
        };
        Ok(command)
    }

    /// Canonical wire form joined by `delimiter`.
    pub fn encode(&self, delimiter: &str) -> String {
        let mut fields: Vec<String> = vec![self.hash().to_string(), self.kind().keyword().to_string()];
        match self {
            Self::Console(c) => fields.extend(c.args.iter().cloned()),
            Self::Init(InitCommand { child, .. }) | Self::AddChild(AddChildCommand { child, .. }) => {
                fields.push(child.host.to_string());
                fields.push(child.port.to_string());
            }
            Self::Report(c) => fields.push(c.text.clone()),
        }
        fields.join(delimiter)
    }

    /// Dedup key: SHA-256 hex digest of the canonical wire form.
    pub fn digest(&self) -> String {
        compute_digest(self.to_string().as_bytes())
    }
}

/// Split off the first non-empty token; runs of delimiters count as one.
fn next_token<'a>(s: &'a str, delimiter: &str) -> (&'a str, &'a str) {
    let s = s.trim_start_matches(delimiter);
    s.split_once(delimiter).unwrap_or((s, ""))
}

fn parse_child<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    kind: &'static str,
) -> Result<Address, ProtocolError> {
    let host = tokens
        .next()
        .ok_or(ProtocolError::MissingField { kind, field: "host" })?;
    let port = tokens
        .next()
        .ok_or(ProtocolError::MissingField { kind, field: "port" })?;
    if let Some(extra) = tokens.next() {
        return Err(ProtocolError::InvalidAddress(format!("unexpected argument '{extra}'")));
    }

    let host: IpAddr = host
        .parse()
        .map_err(|e| ProtocolError::InvalidAddress(format!("host '{host}': {e}")))?;
    let port: u16 = port
        .parse()
        .map_err(|e| ProtocolError::InvalidAddress(format!("port '{port}': {e}")))?;
    Ok(Address::new(host, port))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(WIRE_DELIMITER))
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, WIRE_DELIMITER)
    }
}

impl From<ConsoleCommand> for Command {
    fn from(c: ConsoleCommand) -> Self {
        Self::Console(c)
    }
}

impl From<InitCommand> for Command {
    fn from(c: InitCommand) -> Self {
        Self::Init(c)
    }
}

impl From<AddChildCommand> for Command {
    fn from(c: AddChildCommand) -> Self {
        Self::AddChild(c)
    }
}

impl From<ReportCommand> for Command {
    fn from(c: ReportCommand) -> Self {
        Self::Report(c)
    }
}
