//! Certificate lifecycle: generate, renew and inspect a node's CA and
//! node certificates.
//!
//! Lifecycle of a certificate directory:
//!   Absent ──generate──▶ Issued ──renew──▶ Issued
//!                          │
//!                          └──generate (overwrite)──▶ Issued (same keys)
//!
//! Keys outlive certificates: whenever a vault exists, both `generate` and
//! `renew` reuse the stored keys so the node's identity never changes.

pub mod inspect;
pub mod layout;
pub mod templates;

use std::path::{Path, PathBuf};

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::cipher::SecretCipher;
use crate::codec;
use crate::error::{CertError, Result};
use crate::fsutil;
use crate::keys::KeyRole;
use crate::toolkit::PkiToolkit;
use crate::vault::PrivateKeyVault;

pub use inspect::{CertificateEntry, CertificateReport, ValidityWindow};
pub use layout::{CertDirState, CertLayout};

/// Random bytes in each fresh certificate serial.
pub const SERIAL_BYTES: usize = 19;

/// Certificate validity periods in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub ca_days: u32,
    pub node_days: u32,
}

impl Default for Validity {
    fn default() -> Self {
        Self {
            ca_days: 7300,
            node_days: 375,
        }
    }
}

impl Validity {
    /// The node certificate must not outlive the CA that signed it.
    pub fn check(&self) -> Result<()> {
        if self.ca_days == 0 || self.node_days == 0 {
            return Err(CertError::InvalidConfiguration(
                "certificate validity must be at least one day".to_string(),
            ));
        }
        if self.ca_days < self.node_days {
            return Err(CertError::InvalidConfiguration(format!(
                "CA certificate validity ({} days) is shorter than node certificate validity ({} days)",
                self.ca_days, self.node_days
            )));
        }
        Ok(())
    }
}

/// Inputs for `generate`.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub cert_dir: PathBuf,
    pub ca_name: String,
    pub node_name: String,
    pub validity: Validity,
    /// Replace an existing certificate directory instead of failing.
    pub overwrite: bool,
    pub vault_path: PathBuf,
    pub password: String,
}

/// Inputs for `renew`.
#[derive(Debug, Clone)]
pub struct RenewRequest {
    pub cert_dir: PathBuf,
    pub validity: Validity,
    pub vault_path: PathBuf,
    pub password: String,
}

/// PEM text and validity of a freshly issued certificate set.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    pub ca_certificate: String,
    pub node_certificate: String,
    /// Node certificate followed by the CA certificate.
    pub combined_certificate: String,
    pub ca_validity: ValidityWindow,
    pub node_validity: ValidityWindow,
}

/// Orchestrates the toolkit and the vault over one certificate directory.
pub struct CertificateLifecycleManager<T, C> {
    toolkit: T,
    vault: PrivateKeyVault<C>,
}

impl<T: PkiToolkit, C: SecretCipher> CertificateLifecycleManager<T, C> {
    pub fn new(toolkit: T, vault: PrivateKeyVault<C>) -> Self {
        Self { toolkit, vault }
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn vault(&self) -> &PrivateKeyVault<C> {
        &self.vault
    }

    /// Create a certificate directory with a CA and a node certificate.
    ///
    /// Keys stored in the vault are reused; only missing keys are generated.
    /// On failure the directory may be left partially populated.
    pub fn generate(&self, request: &GenerateRequest) -> Result<CertificateBundle> {
        request.validity.check()?;
        self.toolkit.ensure_available()?;

        let layout = CertLayout::new(&request.cert_dir)?;
        if layout.state() != CertDirState::Absent {
            if !request.overwrite {
                return Err(CertError::DirectoryExists(layout.root().to_path_buf()));
            }
            info!("Removing existing certificate directory {}", layout.root().display());
            fsutil::remove_dir(layout.root())?;
        }
        fsutil::create_dir(layout.root())?;

        let key_files = layout.key_files();
        if request.vault_path.exists() {
            let restored = self.vault.restore(&request.vault_path, &key_files, &request.password)?;
            debug!(?restored, "Reusing vaulted private keys");
        }
        for role in KeyRole::ALL {
            let path = key_files.path(role);
            if !path.exists() {
                info!(%role, "Generating private key");
                self.toolkit.generate_private_key(path)?;
            }
            fsutil::restrict_to_owner(path)?;
        }

        fsutil::write_file(&layout.ca_config(), &templates::ca_config(&layout, &request.ca_name))?;
        fsutil::write_file(&layout.node_config(), &templates::node_config(&request.node_name))?;
        fsutil::write_file(&layout.ledger(), "")?;
        fsutil::create_dir(&layout.new_certs_dir())?;

        let ca_public = self.toolkit.derive_public_key(&layout.ca_key())?;
        fsutil::write_file(&layout.ca_public_key(), &ca_public)?;

        info!(days = request.validity.ca_days, "Creating CA certificate");
        self.toolkit.self_sign(
            &layout.ca_config(),
            &layout.ca_key(),
            request.validity.ca_days,
            &layout.ca_cert(),
        )?;

        info!("Creating node CSR");
        self.toolkit
            .create_csr(&layout.node_config(), &layout.node_key(), &layout.node_csr())?;
        self.sign_node(&layout, request.validity.node_days)?;
        self.combine(&layout)?;

        self.vault
            .persist(&request.vault_path, &key_files, &request.password, &self.toolkit)?;

        let bundle = self.bundle(&layout)?;
        info!("Certificates generated in {}", layout.root().display());
        Ok(bundle)
    }

    /// Re-issue both certificates in an existing directory with the vaulted
    /// keys. The previous node certificate is revoked on a best-effort basis.
    pub fn renew(&self, request: &RenewRequest) -> Result<CertificateBundle> {
        request.validity.check()?;
        self.toolkit.ensure_available()?;

        let layout = CertLayout::new(&request.cert_dir)?;
        if layout.state() == CertDirState::Absent {
            return Err(CertError::DirectoryNotFound(layout.root().to_path_buf()));
        }
        if !request.vault_path.exists() {
            return Err(CertError::VaultNotFound(request.vault_path.clone()));
        }

        let key_files = layout.key_files();
        let reissued = self
            .vault
            .restore(&request.vault_path, &key_files, &request.password)
            .and_then(|_| self.reissue(&layout, request.validity));

        // Restored keys go back to vault-only whether or not reissue worked
        match reissued {
            Ok(()) => self.vault.discard_plaintext(&key_files)?,
            Err(e) => {
                if let Err(cleanup) = self.vault.discard_plaintext(&key_files) {
                    warn!(error = %cleanup, "Could not remove restored private key files");
                }
                return Err(e);
            }
        }

        let bundle = self.bundle(&layout)?;
        info!("Certificates renewed in {}", layout.root().display());
        Ok(bundle)
    }

    /// Validity windows, public keys and addresses of an issued bundle.
    pub fn info(&self, cert_dir: &Path) -> Result<CertificateReport> {
        self.toolkit.ensure_available()?;

        let layout = CertLayout::new(cert_dir)?;
        match layout.state() {
            CertDirState::Absent => return Err(CertError::DirectoryNotFound(layout.root().to_path_buf())),
            CertDirState::Initialized => return Err(CertError::NotIssued(layout.root().to_path_buf())),
            CertDirState::Issued => {}
        }
        self.report(&layout)
    }

    /// Revoke the current node certificate, then issue a fresh CA and node
    /// certificate from the restored key files.
    fn reissue(&self, layout: &CertLayout, validity: Validity) -> Result<()> {
        let key_files = layout.key_files();
        for role in KeyRole::ALL {
            let path = key_files.path(role);
            if !path.exists() {
                return Err(CertError::MissingKey {
                    role,
                    path: path.to_path_buf(),
                });
            }
        }

        if layout.node_cert().exists() {
            info!("Revoking previous node certificate");
            if let Err(e) = self.toolkit.revoke(&layout.ca_config(), &layout.node_cert()) {
                warn!(error = %e, "Revocation of previous node certificate failed, continuing");
            }
        }

        info!(days = validity.ca_days, "Renewing CA certificate");
        self.toolkit
            .self_sign(&layout.ca_config(), &layout.ca_key(), validity.ca_days, &layout.ca_cert())?;

        info!("Renewing node certificate");
        self.toolkit
            .create_csr(&layout.node_config(), &layout.node_key(), &layout.node_csr())?;
        self.sign_node(layout, validity.node_days)?;
        self.combine(layout)
    }

    fn sign_node(&self, layout: &CertLayout, days: u32) -> Result<()> {
        fsutil::write_file(&layout.serial(), &fresh_serial())?;
        info!(days, "Signing node certificate");
        self.toolkit
            .sign_csr(&layout.ca_config(), &layout.node_csr(), days, &layout.node_cert())
    }

    fn combine(&self, layout: &CertLayout) -> Result<()> {
        let node = fsutil::read_file(&layout.node_cert())?;
        let ca = fsutil::read_file(&layout.ca_cert())?;
        fsutil::write_file(&layout.combined_cert(), &format!("{node}{ca}"))
    }

    fn report(&self, layout: &CertLayout) -> Result<CertificateReport> {
        let dump = self.toolkit.dump_bundle(&layout.combined_cert())?;
        let certs = inspect::parse_bundle_dump(&dump)?;

        let ca_public_path = layout.ca_public_key();
        let ca_public = if ca_public_path.is_file() {
            let pem = fsutil::read_file(&ca_public_path)?;
            Some(codec::extract_public_key(KeyRole::Ca, &pem)?)
        } else {
            None
        };
        inspect::build_report(&certs, ca_public.as_deref())
    }

    fn bundle(&self, layout: &CertLayout) -> Result<CertificateBundle> {
        let report = self.report(layout)?;
        Ok(CertificateBundle {
            ca_certificate: fsutil::read_file(&layout.ca_cert())?,
            node_certificate: fsutil::read_file(&layout.node_cert())?,
            combined_certificate: fsutil::read_file(&layout.combined_cert())?,
            ca_validity: report.ca.validity(),
            node_validity: report.node.validity(),
        })
    }
}

/// Uppercase hex serial from `SERIAL_BYTES` random bytes, newline terminated.
pub fn fresh_serial() -> String {
    let mut bytes = [0u8; SERIAL_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}\n", hex::encode_upper(bytes))
}
