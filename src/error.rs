//! Error types for certificate and vault operations

use std::path::PathBuf;

use crate::keys::KeyRole;

/// Result type alias for nodecert operations
pub type Result<T> = std::result::Result<T, CertError>;

/// Errors surfaced by the vault, the lifecycle manager and the toolkit adapter.
///
/// Nothing is retried internally. The only error that is logged and dropped
/// instead of returned is a failed revocation during `renew`.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("PKI toolkit unavailable: {0}")]
    ToolkitUnavailable(String),

    #[error("Certificate directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Certificate directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Vault file not found, private keys cannot be restored: {}", .0.display())]
    VaultNotFound(PathBuf),

    #[error("Failed to read vault {}: {reason}", path.display())]
    VaultRead { path: PathBuf, reason: String },

    #[error("{role} private key failed integrity check: {reason}")]
    KeyIntegrity { role: KeyRole, reason: String },

    #[error("{role} private key could not be decrypted (wrong password?)")]
    AuthenticationFailed { role: KeyRole },

    #[error("{role} private key file is missing: {}", path.display())]
    MissingKey { role: KeyRole, path: PathBuf },

    #[error("No issued certificate bundle in {}", .0.display())]
    NotIssued(PathBuf),

    #[error("File operation failed on {}: {reason}", path.display())]
    FileIo { path: PathBuf, reason: String },

    #[error("Toolkit command `{command}` failed ({status}): {stderr}")]
    ToolkitExecution {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected toolkit output: {0}")]
    InvalidDump(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

impl CertError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        CertError::FileIo {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn integrity(role: KeyRole, reason: impl Into<String>) -> Self {
        CertError::KeyIntegrity {
            role,
            reason: reason.into(),
        }
    }
}
