//! Conversion between the toolkit's PEM key files and 64-hex key material.
//!
//! Ed25519 private keys are stored by the toolkit as PKCS#8 (`PRIVATE KEY`)
//! and public keys as SubjectPublicKeyInfo (`PUBLIC KEY`). Both DER
//! encodings are a fixed algorithm header followed by the 32 raw key bytes,
//! so the key is always the trailing 32 bytes of the decoded body.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{CertError, Result};
use crate::keys::{decode_key_hex, KeyRole, KEY_HEX_LEN};
use crate::toolkit::KeyGenerator;

/// PKCS#8 header preceding an Ed25519 seed.
pub const PRIVATE_KEY_PREFIX: [u8; 16] = [
    0x30, 0x2E, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2B, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

/// SubjectPublicKeyInfo header preceding an Ed25519 public key.
pub const PUBLIC_KEY_PREFIX: [u8; 12] = [
    0x30, 0x2A, 0x30, 0x05, 0x06, 0x03, 0x2B, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Base64 body of a PEM document, with the armor lines removed.
pub fn pem_body(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect()
}

/// Trailing 32 bytes of a PEM body as uppercase hex.
fn trailing_key_hex(role: KeyRole, pem: &str) -> Result<String> {
    let der = BASE64
        .decode(pem_body(pem))
        .map_err(|e| CertError::integrity(role, format!("key file is not valid base64: {e}")))?;
    if der.len() < 32 {
        return Err(CertError::integrity(
            role,
            format!("key file holds {} bytes, expected at least 32", der.len()),
        ));
    }
    let encoded = hex::encode_upper(der);
    Ok(encoded[encoded.len() - KEY_HEX_LEN..].to_string())
}

/// Extract the 64-hex-character seed from PEM private key text.
pub fn extract_seed(role: KeyRole, pem: &str) -> Result<String> {
    trailing_key_hex(role, pem)
}

/// Read a private key file and extract its seed.
pub fn extract_seed_from_file(role: KeyRole, path: &Path) -> Result<String> {
    let pem = std::fs::read_to_string(path).map_err(|e| CertError::file_io(path, e))?;
    extract_seed(role, &pem)
}

/// Extract the 64-hex-character public key from PEM public key text.
pub fn extract_public_key(role: KeyRole, pem: &str) -> Result<String> {
    trailing_key_hex(role, pem)
}

/// Derive the public key of a private key file through the toolkit.
pub fn public_key_hex(keys: &dyn KeyGenerator, role: KeyRole, private_key: &Path) -> Result<String> {
    let pem = keys.derive_public_key(private_key)?;
    extract_public_key(role, &pem)
}

/// Wrap a seed into PKCS#8 PEM text the toolkit can read.
pub fn wrap_seed(role: KeyRole, seed_hex: &str) -> Result<String> {
    let seed = decode_key_hex(role, seed_hex)?;
    Ok(wrap(&PRIVATE_KEY_PREFIX, &seed, "PRIVATE KEY"))
}

/// Wrap a raw public key into SubjectPublicKeyInfo PEM text.
pub fn wrap_public_key(role: KeyRole, public_key_hex: &str) -> Result<String> {
    let public_key = decode_key_hex(role, public_key_hex)?;
    Ok(wrap(&PUBLIC_KEY_PREFIX, &public_key, "PUBLIC KEY"))
}

fn wrap(prefix: &[u8], key: &[u8; 32], label: &str) -> String {
    let mut der = Vec::with_capacity(prefix.len() + key.len());
    der.extend_from_slice(prefix);
    der.extend_from_slice(key);
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        BASE64.encode(der)
    )
}
