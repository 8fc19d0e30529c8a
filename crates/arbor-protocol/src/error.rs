use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,

    #[error("unknown command keyword: {0}")]
    UnknownKeyword(String),

    #[error("missing field '{field}' in {kind} command")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("crypto error: {0}")]
    Crypto(String),
}
