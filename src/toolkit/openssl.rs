//! OpenSSL command-line adapter
//!
//! Each capability maps to one blocking `openssl` invocation. Commands:
//!   genpkey      → private key
//!   pkey -pubout → public key
//!   req -x509    → self-signed CA certificate
//!   req -new     → node CSR
//!   ca           → signing and revocation
//!   crl2pkcs7 | pkcs7 -print_certs → bundle dump

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{CertificateAuthority, CertificateInspector, CertificateSigner, KeyGenerator, PkiToolkit};
use crate::error::{CertError, Result};

/// Oldest OpenSSL release with the Ed25519 `req`/`ca` support we rely on.
pub const DEFAULT_MIN_VERSION: &str = "3.0.2";

static VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^OpenSSL +([^ ]+) ").expect("valid regex"));

/// Runs the `openssl` binary for every toolkit capability.
#[derive(Debug, Clone)]
pub struct OpenSslToolkit {
    binary: PathBuf,
    min_version: String,
}

impl Default for OpenSslToolkit {
    fn default() -> Self {
        Self::new("openssl", DEFAULT_MIN_VERSION)
    }
}

impl OpenSslToolkit {
    pub fn new(binary: impl Into<PathBuf>, min_version: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            min_version: min_version.into(),
        }
    }

    fn command_line(&self, args: &[&OsStr]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn spawn_error(&self, command: &str, e: std::io::Error) -> CertError {
        if e.kind() == std::io::ErrorKind::NotFound {
            CertError::ToolkitUnavailable(format!("{} not found", self.binary.display()))
        } else {
            CertError::ToolkitExecution {
                command: command.to_string(),
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            }
        }
    }

    fn check_status(command: String, output: Output) -> Result<Output> {
        if output.status.success() {
            return Ok(output);
        }
        Err(CertError::ToolkitExecution {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run openssl with `args`, failing on a non-zero exit.
    fn run(&self, args: &[&OsStr]) -> Result<Output> {
        self.run_with_input(args, None)
    }

    fn run_with_input(&self, args: &[&OsStr], input: Option<&[u8]>) -> Result<Output> {
        let command = self.command_line(args);
        debug!(command = %command, "Running toolkit command");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&command, e))?;

        if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin
                .write_all(data)
                .map_err(|e| self.spawn_error(&command, e))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.spawn_error(&command, e))?;
        Self::check_status(command, output)
    }

    fn stdout_text(output: Output) -> Result<String> {
        String::from_utf8(output.stdout)
            .map_err(|e| CertError::InvalidDump(format!("toolkit output is not UTF-8: {e}")))
    }
}

fn days_arg(days: u32) -> OsString {
    OsString::from(days.to_string())
}

impl KeyGenerator for OpenSslToolkit {
    fn generate_private_key(&self, out: &Path) -> Result<()> {
        self.run(&[
            "genpkey".as_ref(),
            "-algorithm".as_ref(),
            "ed25519".as_ref(),
            "-outform".as_ref(),
            "PEM".as_ref(),
            "-out".as_ref(),
            out.as_os_str(),
        ])?;
        Ok(())
    }

    fn derive_public_key(&self, private_key: &Path) -> Result<String> {
        let output = self.run(&[
            "pkey".as_ref(),
            "-in".as_ref(),
            private_key.as_os_str(),
            "-pubout".as_ref(),
        ])?;
        Self::stdout_text(output)
    }
}

impl CertificateAuthority for OpenSslToolkit {
    fn self_sign(&self, ca_config: &Path, private_key: &Path, days: u32, out: &Path) -> Result<()> {
        let days = days_arg(days);
        self.run(&[
            "req".as_ref(),
            "-config".as_ref(),
            ca_config.as_os_str(),
            "-keyform".as_ref(),
            "PEM".as_ref(),
            "-key".as_ref(),
            private_key.as_os_str(),
            "-new".as_ref(),
            "-x509".as_ref(),
            "-days".as_ref(),
            days.as_os_str(),
            "-out".as_ref(),
            out.as_os_str(),
        ])?;
        Ok(())
    }

    fn revoke(&self, ca_config: &Path, certificate: &Path) -> Result<()> {
        self.run(&[
            "ca".as_ref(),
            "-config".as_ref(),
            ca_config.as_os_str(),
            "-revoke".as_ref(),
            certificate.as_os_str(),
        ])?;
        Ok(())
    }
}

impl CertificateSigner for OpenSslToolkit {
    fn create_csr(&self, node_config: &Path, private_key: &Path, out: &Path) -> Result<()> {
        self.run(&[
            "req".as_ref(),
            "-config".as_ref(),
            node_config.as_os_str(),
            "-key".as_ref(),
            private_key.as_os_str(),
            "-new".as_ref(),
            "-out".as_ref(),
            out.as_os_str(),
        ])?;
        Ok(())
    }

    fn sign_csr(&self, ca_config: &Path, csr: &Path, days: u32, out: &Path) -> Result<()> {
        let days = days_arg(days);
        self.run(&[
            "ca".as_ref(),
            "-config".as_ref(),
            ca_config.as_os_str(),
            "-days".as_ref(),
            days.as_os_str(),
            "-notext".as_ref(),
            "-batch".as_ref(),
            "-in".as_ref(),
            csr.as_os_str(),
            "-out".as_ref(),
            out.as_os_str(),
        ])?;
        Ok(())
    }
}

impl CertificateInspector for OpenSslToolkit {
    fn dump_bundle(&self, bundle: &Path) -> Result<String> {
        let pkcs7 = self.run(&[
            "crl2pkcs7".as_ref(),
            "-nocrl".as_ref(),
            "-certfile".as_ref(),
            bundle.as_os_str(),
        ])?;
        let text = self.run_with_input(
            &[
                "pkcs7".as_ref(),
                "-print_certs".as_ref(),
                "-text".as_ref(),
                "-noout".as_ref(),
            ],
            Some(&pkcs7.stdout),
        )?;
        Self::stdout_text(text)
    }
}

impl PkiToolkit for OpenSslToolkit {
    fn ensure_available(&self) -> Result<String> {
        let output = self
            .run(&["version".as_ref()])
            .map_err(|e| CertError::ToolkitUnavailable(format!("openssl execution failure: {e}")))?;
        let banner = String::from_utf8_lossy(&output.stdout).to_string();

        let version = parse_version_banner(&banner).ok_or_else(|| {
            CertError::ToolkitUnavailable(format!("unrecognised version output: {}", banner.trim()))
        })?;

        if !version_at_least(&version, &self.min_version) {
            return Err(CertError::ToolkitUnavailable(format!(
                "requires openssl version >={}, found {}",
                self.min_version, version
            )));
        }
        debug!(version = %version, "OpenSSL available");
        Ok(version)
    }
}

/// Version string from `openssl version` output, e.g. `3.0.13`.
pub fn parse_version_banner(banner: &str) -> Option<String> {
    VERSION_LINE
        .captures(banner.trim_start())
        .map(|c| c[1].to_string())
}

/// Numeric comparison of dotted versions; letter suffixes are ignored.
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    let parse = |v: &str| -> (u32, u32, u32) {
        let mut parts = v.trim_start_matches('v').split('.').map(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        });
        (
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
            parts.next().unwrap_or(0),
        )
    };

    parse(version) >= parse(minimum)
}
