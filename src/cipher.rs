//! Password-based encryption of private key hex strings.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! # Ciphertext layout
//!
//! Uppercase hex of `salt (16) || nonce (12) || ciphertext || tag (16)`.
//!
//! Decryption reports authentication failure explicitly instead of returning
//! an empty string, so a wrong password is never mistaken for plaintext.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CertError, Result};

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Outcome of a decryption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    Decrypted(String),
    /// Well-formed ciphertext that did not authenticate under the password.
    AuthenticationFailed,
    /// Input is not in the ciphertext layout at all.
    NotCiphertext,
}

/// Password-based encrypt/decrypt of a text secret.
pub trait SecretCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str, password: &str) -> Decryption;
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Settings {
    pub memory_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kb: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Argon2id + ChaCha20-Poly1305 implementation of [`SecretCipher`].
#[derive(Debug, Clone, Default)]
pub struct PasswordCipher {
    settings: Argon2Settings,
}

impl PasswordCipher {
    pub fn new(settings: Argon2Settings) -> Self {
        Self { settings }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let params = Params::new(
            self.settings.memory_kb,
            self.settings.iterations,
            self.settings.parallelism,
            Some(32),
        )
        .map_err(|e| CertError::Encryption(format!("Invalid Argon2 params: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| CertError::Encryption(format!("Key derivation failed: {e}")))?;
        Ok(key)
    }
}

impl SecretCipher for PasswordCipher {
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(password, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CertError::Encryption(e.to_string()))?;

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode_upper(out))
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Decryption {
        let Ok(bytes) = hex::decode(ciphertext) else {
            return Decryption::NotCiphertext;
        };
        if bytes.len() <= SALT_LEN + NONCE_LEN + AUTH_TAG_LEN {
            return Decryption::NotCiphertext;
        }
        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let Ok(key) = self.derive_key(password, salt) else {
            return Decryption::AuthenticationFailed;
        };
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
        match cipher.decrypt(Nonce::from_slice(nonce), sealed) {
            Ok(plain) => match String::from_utf8(plain) {
                Ok(text) => Decryption::Decrypted(text),
                Err(_) => Decryption::AuthenticationFailed,
            },
            Err(_) => Decryption::AuthenticationFailed,
        }
    }
}
