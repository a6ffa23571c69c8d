//! Fixed file layout of a certificate directory
//!
//!   cert/
//!     ├── ca.cnf              # CA policy + request config
//!     ├── node.cnf            # node request config
//!     ├── index.txt           # issuance ledger
//!     ├── serial.dat          # next serial number
//!     ├── new_certs/          # toolkit copies of issued certificates
//!     ├── ca.key.pem          # transient, removed after vaulting
//!     ├── ca.pubkey.pem
//!     ├── node.key.pem        # kept for the running peer unless configured otherwise
//!     ├── ca.crt.pem
//!     ├── node.csr.pem
//!     ├── node.crt.pem
//!     └── node.full.crt.pem   # node.crt.pem followed by ca.crt.pem

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{CertError, Result};
use crate::keys::KeyFiles;

pub const CA_CONFIG: &str = "ca.cnf";
pub const NODE_CONFIG: &str = "node.cnf";
pub const LEDGER: &str = "index.txt";
pub const SERIAL: &str = "serial.dat";
pub const NEW_CERTS_DIR: &str = "new_certs";
pub const CA_KEY: &str = "ca.key.pem";
pub const CA_PUBLIC_KEY: &str = "ca.pubkey.pem";
pub const NODE_KEY: &str = "node.key.pem";
pub const CA_CERT: &str = "ca.crt.pem";
pub const NODE_CSR: &str = "node.csr.pem";
pub const NODE_CERT: &str = "node.crt.pem";
pub const FULL_CERT: &str = "node.full.crt.pem";

/// Where a certificate directory is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertDirState {
    /// Directory does not exist
    Absent,
    /// Directory exists but holds no combined certificate yet
    Initialized,
    /// Combined certificate present
    Issued,
}

/// Absolute paths of every well-known file in a certificate directory.
#[derive(Debug, Clone)]
pub struct CertLayout {
    root: PathBuf,
}

impl CertLayout {
    /// Resolve `dir` against the current directory once, so no later step
    /// depends on the process working directory.
    pub fn new(dir: &Path) -> Result<Self> {
        let root = std::path::absolute(dir).map_err(|e| CertError::file_io(dir, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> CertDirState {
        if !self.root.is_dir() {
            CertDirState::Absent
        } else if self.combined_cert().is_file() {
            CertDirState::Issued
        } else {
            CertDirState::Initialized
        }
    }

    pub fn ca_config(&self) -> PathBuf {
        self.root.join(CA_CONFIG)
    }

    pub fn node_config(&self) -> PathBuf {
        self.root.join(NODE_CONFIG)
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join(LEDGER)
    }

    pub fn serial(&self) -> PathBuf {
        self.root.join(SERIAL)
    }

    pub fn new_certs_dir(&self) -> PathBuf {
        self.root.join(NEW_CERTS_DIR)
    }

    pub fn ca_key(&self) -> PathBuf {
        self.root.join(CA_KEY)
    }

    pub fn ca_public_key(&self) -> PathBuf {
        self.root.join(CA_PUBLIC_KEY)
    }

    pub fn node_key(&self) -> PathBuf {
        self.root.join(NODE_KEY)
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.root.join(CA_CERT)
    }

    pub fn node_csr(&self) -> PathBuf {
        self.root.join(NODE_CSR)
    }

    pub fn node_cert(&self) -> PathBuf {
        self.root.join(NODE_CERT)
    }

    pub fn combined_cert(&self) -> PathBuf {
        self.root.join(FULL_CERT)
    }

    pub fn key_files(&self) -> KeyFiles {
        KeyFiles::new(self.ca_key(), self.node_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_absolute() {
        let layout = CertLayout::new(Path::new("relative/cert")).unwrap();
        assert!(layout.root().is_absolute());
        assert!(layout.ca_config().ends_with("relative/cert/ca.cnf"));
        assert_eq!(layout.key_files().node, layout.node_key());
    }

    #[test]
    fn test_state_transitions() {
        let dir = TempDir::new().unwrap();
        let layout = CertLayout::new(&dir.path().join("cert")).unwrap();
        assert_eq!(layout.state(), CertDirState::Absent);

        std::fs::create_dir(layout.root()).unwrap();
        assert_eq!(layout.state(), CertDirState::Initialized);

        std::fs::write(layout.combined_cert(), "pem").unwrap();
        assert_eq!(layout.state(), CertDirState::Issued);
    }
}
