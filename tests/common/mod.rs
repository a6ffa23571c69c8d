//! Shared test helpers: an in-process PKI toolkit and fast cipher settings.
//!
//! FakeToolkit produces real Ed25519 key files (PKCS#8 PEM via the crate's
//! own codec) and JSON-bodied stand-ins for certificates. Its bundle dump
//! mimics the OpenSSL text layout the lifecycle parser reads.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use nodecert::codec;
use nodecert::keys::decode_key_hex;
use nodecert::toolkit::{
    CertificateAuthority, CertificateInspector, CertificateSigner, KeyGenerator, PkiToolkit,
};
use nodecert::{Argon2Settings, CertError, KeyRole, PasswordCipher, PrivateKeyVault, Result};

pub fn fast_cipher() -> PasswordCipher {
    PasswordCipher::new(Argon2Settings {
        memory_kb: 1024,
        iterations: 1,
        parallelism: 1,
    })
}

pub fn fast_vault() -> PrivateKeyVault<PasswordCipher> {
    PrivateKeyVault::new(fast_cipher())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FakeCertificate {
    subject: String,
    issuer: String,
    public_key: String,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FakeCsr {
    subject: String,
    public_key: String,
}

fn io_error(path: &Path, reason: impl ToString) -> CertError {
    CertError::FileIo {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn failure(command: &str, stderr: &str) -> CertError {
    CertError::ToolkitExecution {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| io_error(path, e))
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| io_error(path, e))
}

fn common_name(config: &str) -> Option<String> {
    config
        .lines()
        .filter_map(|l| l.trim().strip_prefix("CN = "))
        .last()
        .map(str::to_string)
}

fn encode_certificate(cert: &FakeCertificate) -> String {
    let json = serde_json::to_vec(cert).unwrap();
    format!(
        "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
        BASE64.encode(json)
    )
}

fn decode_certificates(pem: &str) -> Vec<FakeCertificate> {
    pem.split("-----BEGIN CERTIFICATE-----")
        .filter_map(|block| block.split("-----END CERTIFICATE-----").next())
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .map(|body| serde_json::from_slice(&BASE64.decode(body).unwrap()).unwrap())
        .collect()
}

fn pub_block(public_key_hex: &str) -> String {
    let bytes = hex::decode(public_key_hex).unwrap();
    bytes
        .chunks(15)
        .map(|chunk| {
            let line = chunk
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":");
            format!("                    {line}")
        })
        .collect::<Vec<_>>()
        .join(":\n")
}

fn toolkit_time(t: DateTime<Utc>) -> String {
    t.format("%b %e %H:%M:%S %Y GMT").to_string()
}

/// In-process toolkit; records the capability calls it receives.
pub struct FakeToolkit {
    pub available: bool,
    pub fail_revoke: bool,
    pub fail_sign: bool,
    calls: RefCell<Vec<String>>,
}

impl Default for FakeToolkit {
    fn default() -> Self {
        Self {
            available: true,
            fail_revoke: false,
            fail_sign: false,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeToolkit {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    pub fn failing_revoke() -> Self {
        Self {
            fail_revoke: true,
            ..Self::default()
        }
    }

    pub fn failing_sign() -> Self {
        Self {
            fail_sign: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }

    fn public_key_of(&self, private_key: &Path) -> Result<String> {
        let seed_hex = codec::extract_seed(KeyRole::Node, &read(private_key)?)?;
        let seed = decode_key_hex(KeyRole::Node, &seed_hex)?;
        Ok(hex::encode_upper(
            SigningKey::from_bytes(&seed).verifying_key().to_bytes(),
        ))
    }

    fn ledger(ca_config: &Path) -> PathBuf {
        ca_config.with_file_name("index.txt")
    }
}

impl KeyGenerator for FakeToolkit {
    fn generate_private_key(&self, out: &Path) -> Result<()> {
        self.record("genpkey");
        let key = SigningKey::generate(&mut OsRng);
        let pem = codec::wrap_seed(KeyRole::Node, &hex::encode_upper(key.to_bytes()))?;
        write(out, &pem)
    }

    fn derive_public_key(&self, private_key: &Path) -> Result<String> {
        self.record("pkey");
        codec::wrap_public_key(KeyRole::Node, &self.public_key_of(private_key)?)
    }
}

impl CertificateAuthority for FakeToolkit {
    fn self_sign(&self, ca_config: &Path, private_key: &Path, days: u32, out: &Path) -> Result<()> {
        self.record("req -x509");
        let subject = common_name(&read(ca_config)?)
            .ok_or_else(|| failure("req", "no CN in CA config"))?;
        let not_before = Utc::now().trunc_subsecs(0);
        let cert = FakeCertificate {
            issuer: subject.clone(),
            subject,
            public_key: self.public_key_of(private_key)?,
            serial: "00".to_string(),
            not_before,
            not_after: not_before + Duration::days(i64::from(days)),
        };
        write(out, &encode_certificate(&cert))
    }

    fn revoke(&self, ca_config: &Path, certificate: &Path) -> Result<()> {
        self.record("ca -revoke");
        if self.fail_revoke {
            return Err(failure("ca -revoke", "unable to revoke"));
        }
        let serial = decode_certificates(&read(certificate)?)
            .into_iter()
            .next()
            .map(|c| c.serial)
            .ok_or_else(|| failure("ca -revoke", "unable to load certificate"))?;

        let ledger_path = Self::ledger(ca_config);
        let ledger = read(&ledger_path)?;
        let valid = format!("V\t{serial}\t");
        if !ledger.lines().any(|l| l.starts_with(&valid)) {
            return Err(failure("ca -revoke", "certificate not in database"));
        }
        let updated: String = ledger
            .lines()
            .map(|l| match l.strip_prefix(&valid) {
                Some(rest) => format!("R\t{serial}\t{rest}\n"),
                None => format!("{l}\n"),
            })
            .collect();
        write(&ledger_path, &updated)
    }
}

impl CertificateSigner for FakeToolkit {
    fn create_csr(&self, node_config: &Path, private_key: &Path, out: &Path) -> Result<()> {
        self.record("req -new");
        let csr = FakeCsr {
            subject: common_name(&read(node_config)?)
                .ok_or_else(|| failure("req", "no CN in node config"))?,
            public_key: self.public_key_of(private_key)?,
        };
        write(out, &serde_json::to_string(&csr).unwrap())
    }

    fn sign_csr(&self, ca_config: &Path, csr: &Path, days: u32, out: &Path) -> Result<()> {
        self.record("ca -batch");
        if self.fail_sign {
            return Err(failure("ca -batch", "signing failed"));
        }
        let config = read(ca_config)?;
        let csr: FakeCsr = serde_json::from_str(&read(csr)?)
            .map_err(|e| failure("ca", &e.to_string()))?;
        if !ca_config.with_file_name("ca.crt.pem").exists() {
            return Err(failure("ca", "unable to load CA certificate"));
        }
        let serial = read(&ca_config.with_file_name("serial.dat"))?.trim().to_string();

        let not_before = Utc::now().trunc_subsecs(0);
        let cert = FakeCertificate {
            subject: csr.subject.clone(),
            issuer: common_name(&config).unwrap_or_default(),
            public_key: csr.public_key,
            serial: serial.clone(),
            not_before,
            not_after: not_before + Duration::days(i64::from(days)),
        };

        let ledger_path = Self::ledger(ca_config);
        let mut ledger = read(&ledger_path)?;
        ledger.push_str(&format!("V\t{serial}\tCN={}\n", csr.subject));
        write(&ledger_path, &ledger)?;
        write(out, &encode_certificate(&cert))
    }
}

impl CertificateInspector for FakeToolkit {
    fn dump_bundle(&self, bundle: &Path) -> Result<String> {
        self.record("pkcs7 -print_certs");
        let mut out = String::new();
        for cert in decode_certificates(&read(bundle)?) {
            out.push_str(&format!(
                "Certificate:\n    Data:\n        Serial Number:\n            {}\n        \
                 Issuer: CN = {}\n        Validity\n            Not Before: {}\n            \
                 Not After : {}\n        Subject: CN = {}\n        Subject Public Key Info:\n            \
                 Public Key Algorithm: ED25519\n                ED25519 Public-Key:\n                \
                 pub:\n{}\n    Signature Algorithm: ED25519\n\n",
                cert.serial,
                cert.issuer,
                toolkit_time(cert.not_before),
                toolkit_time(cert.not_after),
                cert.subject,
                pub_block(&cert.public_key),
            ));
        }
        Ok(out)
    }
}

impl PkiToolkit for FakeToolkit {
    fn ensure_available(&self) -> Result<String> {
        if self.available {
            Ok("3.0.13".to_string())
        } else {
            Err(CertError::ToolkitUnavailable("openssl not found".to_string()))
        }
    }
}
