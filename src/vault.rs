//! Private key vault
//!
//! The vault file is the durable home of both private keys. Plaintext PEM
//! key files are working copies: `restore` materializes them for the
//! toolkit and `discard_plaintext` removes them again.
//!
//! ```yaml
//! main:                 # CA
//!   privateKey: <ciphertext or plaintext seed hex>
//!   publicKey: <64 hex>
//!   mainnetAddress: N...
//!   testnetAddress: T...
//!   encrypted: true
//! transport:            # Node
//!   ...
//! ```
//!
//! Entries written before the `encrypted` flag existed are decrypted when
//! possible and otherwise read as plaintext.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::address::derive_addresses;
use crate::cipher::{Decryption, SecretCipher};
use crate::codec;
use crate::error::{CertError, Result};
use crate::fsutil;
use crate::keys::{KeyFiles, KeyMaterial, KeyRole};
use crate::toolkit::KeyGenerator;

/// Persisted vault document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<VaultEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<VaultEntry>,
}

/// One role's stored key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEntry {
    #[serde(default)]
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainnet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet_address: Option<String>,
    /// Absent in vaults written by older releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
}

impl VaultRecord {
    pub fn entry(&self, role: KeyRole) -> Option<&VaultEntry> {
        match role {
            KeyRole::Ca => self.main.as_ref(),
            KeyRole::Node => self.transport.as_ref(),
        }
    }

    pub fn set_entry(&mut self, role: KeyRole, entry: VaultEntry) {
        match role {
            KeyRole::Ca => self.main = Some(entry),
            KeyRole::Node => self.transport = Some(entry),
        }
    }

    /// Entries that actually hold a private key.
    fn populated(&self) -> impl Iterator<Item = (KeyRole, &VaultEntry)> + '_ {
        KeyRole::ALL.into_iter().filter_map(move |role| {
            self.entry(role)
                .filter(|e| !e.private_key.is_empty())
                .map(|e| (role, e))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CertError::VaultNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| CertError::VaultRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| CertError::VaultRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| CertError::file_io(path, e))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fsutil::create_dir(parent)?;
        }
        fsutil::write_private_file_atomic(path, &yaml)
    }
}

/// Owns the vault file and the plaintext key file retention policy.
pub struct PrivateKeyVault<C> {
    cipher: C,
    retain_node_key_file: bool,
}

impl<C: SecretCipher> PrivateKeyVault<C> {
    /// The node key file is retained by default: the running peer reads it.
    pub fn new(cipher: C) -> Self {
        Self {
            cipher,
            retain_node_key_file: true,
        }
    }

    pub fn with_node_key_retention(mut self, retain: bool) -> Self {
        self.retain_node_key_file = retain;
        self
    }

    pub fn retains_node_key_file(&self) -> bool {
        self.retain_node_key_file
    }

    /// Seal the plaintext key files into the vault, then discard plaintext.
    pub fn persist(
        &self,
        vault_path: &Path,
        key_files: &KeyFiles,
        password: &str,
        keys: &dyn KeyGenerator,
    ) -> Result<VaultRecord> {
        info!("Saving private keys to {}", vault_path.display());

        let mut record = VaultRecord::default();
        for role in KeyRole::ALL {
            let path = key_files.path(role);
            let seed = codec::extract_seed_from_file(role, path)?;
            let public = codec::public_key_hex(keys, role, path)?;
            let material = KeyMaterial::new(role, &seed, &public)?;
            record.set_entry(role, self.seal(&material, password)?);
        }
        record.save(vault_path)?;

        self.discard_plaintext(key_files)?;
        Ok(record)
    }

    /// Write plaintext key files for every role the vault holds.
    ///
    /// Existing key files are never overwritten, and roles without stored
    /// data are left alone. Returns the roles that were written.
    pub fn restore(
        &self,
        vault_path: &Path,
        key_files: &KeyFiles,
        password: &str,
    ) -> Result<Vec<KeyRole>> {
        info!("Restoring private keys from {}", vault_path.display());
        let record = VaultRecord::load(vault_path)?;

        let mut written = Vec::new();
        for (role, entry) in record.populated() {
            let material = self.unseal(role, entry, password)?;
            let path = key_files.path(role);
            if path.exists() {
                debug!(%role, path = %path.display(), "Key file already present, not overwriting");
                continue;
            }
            let pem = codec::wrap_seed(role, &material.private_key_hex)?;
            fsutil::write_private_file(path, &pem)?;
            written.push(role);
        }
        Ok(written)
    }

    /// Re-encrypt every stored key under a new password, in place.
    pub fn rotate(&self, vault_path: &Path, old_password: &str, new_password: &str) -> Result<VaultRecord> {
        self.rotate_to(vault_path, vault_path, old_password, new_password)
    }

    /// Re-encrypt `input` under a new password and write the result to `output`.
    pub fn rotate_to(
        &self,
        input: &Path,
        output: &Path,
        old_password: &str,
        new_password: &str,
    ) -> Result<VaultRecord> {
        info!("Changing vault password for {}", input.display());
        let record = VaultRecord::load(input)?;
        let plain = self.decrypt_record(&record, old_password)?;
        let sealed = self.encrypt_record(&plain, new_password)?;
        sealed.save(output)?;
        Ok(sealed)
    }

    /// Encrypt a plaintext vault document.
    pub fn encrypt_file(&self, input: &Path, output: &Path, password: &str) -> Result<VaultRecord> {
        let record = VaultRecord::load(input)?;
        let sealed = self.encrypt_record(&record, password)?;
        sealed.save(output)?;
        Ok(sealed)
    }

    /// Decrypt a vault document into its plaintext form.
    pub fn decrypt_file(&self, input: &Path, output: &Path, password: &str) -> Result<VaultRecord> {
        let record = VaultRecord::load(input)?;
        let plain = self.decrypt_record(&record, password)?;
        plain.save(output)?;
        Ok(plain)
    }

    /// Recover every populated entry to plaintext (`encrypted: false`).
    pub fn decrypt_record(&self, record: &VaultRecord, password: &str) -> Result<VaultRecord> {
        let mut plain = VaultRecord::default();
        for (role, entry) in record.populated() {
            let material = self.unseal(role, entry, password)?;
            plain.set_entry(role, plaintext_entry(&material)?);
        }
        Ok(plain)
    }

    /// Encrypt a record whose entries hold plaintext seeds.
    pub fn encrypt_record(&self, record: &VaultRecord, password: &str) -> Result<VaultRecord> {
        let mut sealed = VaultRecord::default();
        for (role, entry) in record.populated() {
            if entry.encrypted == Some(true) {
                return Err(CertError::InvalidConfiguration(format!(
                    "{role} private key is already encrypted"
                )));
            }
            let material = match entry.public_key.as_deref().filter(|p| !p.is_empty()) {
                Some(public) => KeyMaterial::new(role, &entry.private_key, public)?,
                None => KeyMaterial::from_seed(role, &entry.private_key)?,
            };
            sealed.set_entry(role, self.seal(&material, password)?);
        }
        Ok(sealed)
    }

    /// Delete plaintext key files according to the retention policy.
    pub fn discard_plaintext(&self, key_files: &KeyFiles) -> Result<()> {
        for role in KeyRole::ALL {
            if role == KeyRole::Node && self.retain_node_key_file {
                debug!("Keeping node private key file for the running peer");
                continue;
            }
            let path = key_files.path(role);
            if path.exists() {
                info!(%role, "Removing plaintext private key file");
                fsutil::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn seal(&self, material: &KeyMaterial, password: &str) -> Result<VaultEntry> {
        let addresses = derive_addresses(&material.public_key_hex)?;
        let (private_key, encrypted) = if password.is_empty() {
            warn!(role = %material.role, "Empty password, storing private key unencrypted");
            (material.private_key_hex.clone(), false)
        } else {
            (self.cipher.encrypt(&material.private_key_hex, password)?, true)
        };

        Ok(VaultEntry {
            private_key,
            public_key: Some(material.public_key_hex.clone()),
            mainnet_address: Some(addresses.mainnet),
            testnet_address: Some(addresses.testnet),
            encrypted: Some(encrypted),
        })
    }

    fn unseal(&self, role: KeyRole, entry: &VaultEntry, password: &str) -> Result<KeyMaterial> {
        let seed = match entry.encrypted {
            Some(false) => entry.private_key.clone(),
            Some(true) => match self.cipher.decrypt(&entry.private_key, password) {
                Decryption::Decrypted(text) => text,
                Decryption::AuthenticationFailed => {
                    return Err(CertError::AuthenticationFailed { role })
                }
                Decryption::NotCiphertext => {
                    return Err(CertError::integrity(role, "stored value is not ciphertext"))
                }
            },
            None => match self.cipher.decrypt(&entry.private_key, password) {
                Decryption::Decrypted(text) => text,
                _ => {
                    debug!(%role, "Reading unflagged vault entry as plaintext");
                    entry.private_key.clone()
                }
            },
        };

        match entry.public_key.as_deref().filter(|p| !p.is_empty()) {
            Some(public) => KeyMaterial::new(role, &seed, public),
            None => KeyMaterial::from_seed(role, &seed),
        }
    }
}

fn plaintext_entry(material: &KeyMaterial) -> Result<VaultEntry> {
    let addresses = derive_addresses(&material.public_key_hex)?;
    Ok(VaultEntry {
        private_key: material.private_key_hex.clone(),
        public_key: Some(material.public_key_hex.clone()),
        mainnet_address: Some(addresses.mainnet),
        testnet_address: Some(addresses.testnet),
        encrypted: Some(false),
    })
}
