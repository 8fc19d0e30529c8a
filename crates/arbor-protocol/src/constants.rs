/// Default token delimiter on the wire.
pub const WIRE_DELIMITER: &str = " ";

/// Separates the message from its detached signature.
pub const SIGNATURE_SEPARATOR: char = '@';

/// Hash carried by the bootstrap INIT handshake.
pub const BOOTSTRAP_HASH: &str = "0";

/// Default receive buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

// Reply sentinels.
pub const REPLY_UNSUPPORTED: &str = "Unsupported command";
pub const REPLY_DUPLICATE: &str = "Command is already executed";
pub const REPLY_NOT_SUPPORTED: &str = "Not support operation";
pub const REPLY_OK: &str = "OK";
pub const REPLY_ALREADY: &str = "ALREADY";
