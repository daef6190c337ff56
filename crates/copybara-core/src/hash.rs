use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest, displayed and stored as 64 hex chars.
///
/// Used as the migration identity handed to destinations, so the value must
/// stay stable across releases.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash raw bytes.
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(digest))
    }

    pub fn hex(&self) -> &str {
        &self.0
    }

    /// First 8 chars, used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_deterministic() {
        let a = Fingerprint::hash(b"copybara");
        let b = Fingerprint::hash(b"copybara");
        assert_eq!(a, b);
        assert_eq!(a.hex().len(), 64);
    }

    #[test]
    fn display_is_full_hex() {
        let id = Fingerprint::hash(b"test");
        assert_eq!(id.to_string(), id.hex());
        assert_eq!(format!("{:?}", id), format!("Fingerprint({})", id.short()));
    }
}
