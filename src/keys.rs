//! Key roles and validated key material

use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::error::{CertError, Result};

/// Length of a seed or public key in hex characters (32 bytes).
pub const KEY_HEX_LEN: usize = 64;

/// The two identities managed per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    /// Long-lived certificate authority (vault section `main`)
    Ca,
    /// Per-node transport identity (vault section `transport`)
    Node,
}

impl KeyRole {
    pub const ALL: [KeyRole; 2] = [KeyRole::Ca, KeyRole::Node];

    /// Section name used in the vault document.
    pub fn section(&self) -> &'static str {
        match self {
            KeyRole::Ca => "main",
            KeyRole::Node => "transport",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Ca => write!(f, "CA"),
            KeyRole::Node => write!(f, "Node"),
        }
    }
}

/// Plaintext key material for one role.
///
/// Both fields are exactly 64 uppercase hex characters. Construction goes
/// through [`KeyMaterial::new`], which rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub role: KeyRole,
    pub private_key_hex: String,
    pub public_key_hex: String,
}

impl KeyMaterial {
    /// Validate a seed and derive its Ed25519 public key.
    pub fn from_seed(role: KeyRole, private_key_hex: &str) -> Result<Self> {
        let seed = decode_key_hex(role, private_key_hex)?;
        let public = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        Ok(Self {
            role,
            private_key_hex: private_key_hex.to_ascii_uppercase(),
            public_key_hex: hex::encode_upper(public),
        })
    }

    /// Validate a seed against an expected public key.
    pub fn new(role: KeyRole, private_key_hex: &str, public_key_hex: &str) -> Result<Self> {
        let material = Self::from_seed(role, private_key_hex)?;
        if !material.public_key_hex.eq_ignore_ascii_case(public_key_hex) {
            return Err(CertError::integrity(
                role,
                "recovered private key does not match the stored public key",
            ));
        }
        Ok(material)
    }
}

/// Decode a 64-hex-character key into its 32 raw bytes.
pub fn decode_key_hex(role: KeyRole, value: &str) -> Result<[u8; 32]> {
    if value.len() != KEY_HEX_LEN {
        return Err(CertError::integrity(
            role,
            format!("expected {} hex characters, got {}", KEY_HEX_LEN, value.len()),
        ));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(value, &mut bytes)
        .map_err(|e| CertError::integrity(role, format!("not hex: {e}")))?;
    Ok(bytes)
}

/// Plaintext private key file locations, one per role.
#[derive(Debug, Clone)]
pub struct KeyFiles {
    pub ca: PathBuf,
    pub node: PathBuf,
}

impl KeyFiles {
    pub fn new(ca: impl Into<PathBuf>, node: impl Into<PathBuf>) -> Self {
        Self {
            ca: ca.into(),
            node: node.into(),
        }
    }

    pub fn path(&self, role: KeyRole) -> &Path {
        match role {
            KeyRole::Ca => &self.ca,
            KeyRole::Node => &self.node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8032 test vector 1
    const SEED: &str = "9D61B19DEFFD5A60BA844AF492EC2CC44449C5697B326919703BAC031CAE7F60";
    const PUBLIC: &str = "D75A980182B10AB7D54BFED3C964073A0EE172F3DAA62325AF021A68F707511A";

    #[test]
    fn test_from_seed_derives_public_key() {
        let material = KeyMaterial::from_seed(KeyRole::Ca, &SEED.to_lowercase()).unwrap();
        assert_eq!(material.private_key_hex, SEED);
        assert_eq!(material.public_key_hex, PUBLIC);
    }

    #[test]
    fn test_new_rejects_mismatched_public_key() {
        let wrong = "00".repeat(32);
        let err = KeyMaterial::new(KeyRole::Node, SEED, &wrong).unwrap_err();
        assert!(matches!(err, CertError::KeyIntegrity { role: KeyRole::Node, .. }));
        assert!(KeyMaterial::new(KeyRole::Node, SEED, &PUBLIC.to_lowercase()).is_ok());
    }

    #[test]
    fn test_wrong_length_is_integrity_error() {
        for bad in ["", "ABCD", &SEED[..63], &format!("{SEED}00")] {
            let err = decode_key_hex(KeyRole::Ca, bad).unwrap_err();
            assert!(matches!(err, CertError::KeyIntegrity { .. }), "{bad}");
        }
    }

    #[test]
    fn test_non_hex_is_integrity_error() {
        let bad = "Z".repeat(64);
        assert!(matches!(
            decode_key_hex(KeyRole::Ca, &bad),
            Err(CertError::KeyIntegrity { .. })
        ));
    }

    #[test]
    fn test_role_sections() {
        assert_eq!(KeyRole::Ca.section(), "main");
        assert_eq!(KeyRole::Node.section(), "transport");
        assert_eq!(KeyRole::Ca.to_string(), "CA");
    }
}
