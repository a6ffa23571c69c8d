//! PKI toolkit capabilities
//!
//! The lifecycle manager never generates keys or signs certificates itself.
//! It drives an external toolkit through these traits, which keeps the
//! orchestration testable against an in-process fake.
//!
//! Every path handed to a toolkit is absolute; implementations must not
//! depend on the process working directory.

pub mod openssl;

use std::path::Path;

use crate::error::Result;

pub use openssl::OpenSslToolkit;

/// Ed25519 key generation and public key derivation.
pub trait KeyGenerator {
    /// Generate a fresh Ed25519 private key as PKCS#8 PEM at `out`.
    fn generate_private_key(&self, out: &Path) -> Result<()>;

    /// Return the SubjectPublicKeyInfo PEM text for a private key file.
    fn derive_public_key(&self, private_key: &Path) -> Result<String>;
}

/// Self-signing and ledger maintenance for the certificate authority.
pub trait CertificateAuthority {
    /// Create the self-signed CA certificate, valid for `days`.
    fn self_sign(&self, ca_config: &Path, private_key: &Path, days: u32, out: &Path) -> Result<()>;

    /// Mark `certificate` as revoked in the CA's issuance ledger.
    fn revoke(&self, ca_config: &Path, certificate: &Path) -> Result<()>;
}

/// CSR creation and CA-based signing.
pub trait CertificateSigner {
    fn create_csr(&self, node_config: &Path, private_key: &Path, out: &Path) -> Result<()>;

    /// Sign `csr` under the CA described by `ca_config`, valid for `days`.
    fn sign_csr(&self, ca_config: &Path, csr: &Path, days: u32, out: &Path) -> Result<()>;
}

/// Human-readable dump of a PEM certificate bundle.
pub trait CertificateInspector {
    /// Text containing, per certificate in bundle order, the labelled
    /// `Not Before`/`Not After` fields and the `pub:` hex block.
    fn dump_bundle(&self, bundle: &Path) -> Result<String>;
}

/// Everything the lifecycle manager needs from a toolkit.
pub trait PkiToolkit: KeyGenerator + CertificateAuthority + CertificateSigner + CertificateInspector {
    /// Fail with `ToolkitUnavailable` unless the toolkit can be run and is
    /// recent enough. Returns the detected version.
    fn ensure_available(&self) -> Result<String>;
}
