use std::path::Path;

use ed25519_dalek::{Signature, Signer, Verifier};
use sha2::{Digest, Sha256};

pub use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::constants::SIGNATURE_SEPARATOR;
use crate::ProtocolError;

/// Generate a new Ed25519 keypair.
pub fn generate_keypair() -> SigningKey {
    let mut rng = rand::thread_rng();
    SigningKey::generate(&mut rng)
}

/// Compute SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 hex digest, used as the dedup cache key.
pub fn compute_digest(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Sign a message payload with the signing key.
pub fn sign_message(signing_key: &SigningKey, payload: &[u8]) -> Signature {
    signing_key.sign(payload)
}

/// Verify a message signature against the verifying key.
pub fn verify_signature(
    verifying_key: &VerifyingKey,
    payload: &[u8],
    signature: &Signature,
) -> Result<(), ProtocolError> {
    verifying_key
        .verify(payload, signature)
        .map_err(|e| ProtocolError::InvalidSignature(e.to_string()))
}

/// Append a detached signature: `"<message>@<hex signature>"`.
pub fn sign_wire(signing_key: &SigningKey, message: &str) -> String {
    let sig = sign_message(signing_key, message.as_bytes());
    format!("{message}{SIGNATURE_SEPARATOR}{}", hex::encode(sig.to_bytes()))
}

/// Split a signed payload at the last separator into `(message, signature)`.
pub fn split_signed(payload: &str) -> Option<(&str, &str)> {
    payload.rsplit_once(SIGNATURE_SEPARATOR)
}

/// Parse a hex-encoded Ed25519 public key.
pub fn parse_verifying_key(hex_key: &str) -> Result<VerifyingKey, ProtocolError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| ProtocolError::Crypto(format!("invalid hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| ProtocolError::Crypto(format!("public key is {} bytes, expected 32", b.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ProtocolError::Crypto(format!("public key: {e}")))
}

/// Authenticity predicate over a wire message and its detached signature.
pub trait MessageVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &str) -> bool;
}

/// Ed25519 signatures, hex-encoded on the wire.
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    pub fn from_hex(hex_key: &str) -> Result<Self, ProtocolError> {
        parse_verifying_key(hex_key).map(Self::new)
    }
}

impl MessageVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(&bytes) else {
            return false;
        };
        verify_signature(&self.key, message, &sig).is_ok()
    }
}

/// Load an Ed25519 keypair from a file, or create a new one if the file doesn't exist.
/// The file stores the raw 32-byte Ed25519 seed with mode 0600.
pub fn load_or_create_keypair(path: &Path) -> Result<SigningKey, ProtocolError> {
    if path.exists() {
        let seed_bytes = std::fs::read(path)
            .map_err(|e| ProtocolError::Crypto(format!("read key file: {e}")))?;
        let seed: [u8; 32] = seed_bytes.try_into().map_err(|b: Vec<u8>| {
            ProtocolError::Crypto(format!("key file is {} bytes, expected 32", b.len()))
        })?;
        Ok(SigningKey::from_bytes(&seed))
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ProtocolError::Crypto(format!("create dir: {e}")))?;
        }
        let key = generate_keypair();
        std::fs::write(path, key.to_bytes())
            .map_err(|e| ProtocolError::Crypto(format!("write key file: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| ProtocolError::Crypto(format!("set permissions: {e}")))?;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_wire() {
        let key = generate_keypair();
        let verifier = Ed25519Verifier::new(key.verifying_key());
        let signed = sign_wire(&key, "h1 CONSOLE echo hi");
        let (message, sig) = split_signed(&signed).unwrap();
        assert_eq!(message, "h1 CONSOLE echo hi");
        assert!(verifier.verify(message.as_bytes(), sig));
    }

    #[test]
    fn test_verify_tampered_message() {
        let key = generate_keypair();
        let verifier = Ed25519Verifier::new(key.verifying_key());
        let signed = sign_wire(&key, "h1 CONSOLE echo hi");
        let (_, sig) = split_signed(&signed).unwrap();
        assert!(!verifier.verify(b"h1 CONSOLE rm -rf /", sig));
    }

    #[test]
    fn test_verify_garbage_signature() {
        let key = generate_keypair();
        let verifier = Ed25519Verifier::new(key.verifying_key());
        assert!(!verifier.verify(b"h1 REPORT x", "not-hex"));
        assert!(!verifier.verify(b"h1 REPORT x", "abcd"));
    }

    #[test]
    fn test_message_with_separator_splits_last() {
        let key = generate_keypair();
        let signed = sign_wire(&key, "h1 CONSOLE echo a@b");
        let (message, _) = split_signed(&signed).unwrap();
        assert_eq!(message, "h1 CONSOLE echo a@b");
    }

    #[test]
    fn test_verifying_key_hex_roundtrip() {
        let key = generate_keypair();
        let hex_key = hex::encode(key.verifying_key().as_bytes());
        let parsed = parse_verifying_key(&hex_key).unwrap();
        assert_eq!(parsed, key.verifying_key());
        assert!(parse_verifying_key("abcd").is_err());
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(compute_digest(b"hello"), compute_digest(b"hello"));
        assert_ne!(compute_digest(b"hello"), compute_digest(b"world"));
        assert_eq!(compute_digest(b"hello").len(), 64);
    }

    #[test]
    fn test_keypair_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("master.key");
        let k1 = load_or_create_keypair(&path).unwrap();
        let k2 = load_or_create_keypair(&path).unwrap();
        assert_eq!(k1.verifying_key(), k2.verifying_key());
    }
}
