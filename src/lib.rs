//! nodecert: CA and node certificate issuance for a blockchain peer node.
//!
//! Both identities are Ed25519 keypairs that double as account credentials.
//! Private keys live in a password-protected vault file; plaintext key files
//! only exist while an external PKI toolkit needs them.

pub mod address;
pub mod cipher;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod keys;
pub mod lifecycle;
pub mod toolkit;
pub mod vault;

pub use address::{derive_addresses, AccountAddresses, Network};
pub use cipher::{Argon2Settings, Decryption, PasswordCipher, SecretCipher};
pub use config::Config;
pub use error::{CertError, Result};
pub use keys::{KeyFiles, KeyMaterial, KeyRole};
pub use lifecycle::{
    CertDirState, CertificateBundle, CertificateLifecycleManager, CertificateReport, GenerateRequest,
    RenewRequest, Validity,
};
pub use toolkit::{OpenSslToolkit, PkiToolkit};
pub use vault::{PrivateKeyVault, VaultEntry, VaultRecord};
