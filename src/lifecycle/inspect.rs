//! Parsing of toolkit certificate dumps
//!
//! The dump lists each certificate of a bundle in order. Per certificate we
//! read the `Not Before`/`Not After` validity fields and the three-line
//! colon-separated `pub:` block holding the raw Ed25519 public key.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::address::derive_addresses;
use crate::error::{CertError, Result};
use crate::keys::KEY_HEX_LEN;

static NOT_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Not Before\s*:\s*(.+)").expect("valid regex"));
static NOT_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Not After\s*:\s*(.+)").expect("valid regex"));
static PUB_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pub:[ \t]*\r?\n\s+(\S+)\r?\n\s+(\S+)\r?\n\s+(\S+)").expect("valid regex")
});

/// Certificate validity interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// What the dump tells us about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedCertificate {
    pub validity: ValidityWindow,
    /// 64 uppercase hex characters
    pub public_key: String,
}

/// One certificate of the report, with the addresses of its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key: String,
    pub mainnet_address: String,
    pub testnet_address: String,
}

impl CertificateEntry {
    fn from_dump(cert: &DumpedCertificate) -> Result<Self> {
        let addresses = derive_addresses(&cert.public_key)?;
        Ok(Self {
            not_before: cert.validity.not_before,
            not_after: cert.validity.not_after,
            public_key: cert.public_key.clone(),
            mainnet_address: addresses.mainnet,
            testnet_address: addresses.testnet,
        })
    }

    pub fn validity(&self) -> ValidityWindow {
        ValidityWindow {
            not_before: self.not_before,
            not_after: self.not_after,
        }
    }
}

/// CA and node certificate details of an issued bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateReport {
    pub ca: CertificateEntry,
    pub node: CertificateEntry,
}

/// Parse a toolkit time such as `Jan  5 10:00:00 2024 GMT`.
pub fn parse_toolkit_time(value: &str) -> Result<DateTime<Utc>> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .strip_suffix(" GMT")
        .or_else(|| collapsed.strip_suffix(" UTC"))
        .unwrap_or(&collapsed);

    NaiveDateTime::parse_from_str(trimmed, "%b %d %H:%M:%S %Y")
        .map(|t| t.and_utc())
        .map_err(|e| CertError::InvalidDump(format!("bad certificate time '{value}': {e}")))
}

fn public_key_from_block(lines: [&str; 3]) -> Result<String> {
    let hex: String = lines
        .concat()
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_uppercase();

    if hex.len() != KEY_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CertError::InvalidDump(format!(
            "public key block is not a 32-byte key: {hex}"
        )));
    }
    Ok(hex)
}

/// Parse every certificate of a bundle dump, in bundle order.
pub fn parse_bundle_dump(text: &str) -> Result<Vec<DumpedCertificate>> {
    let not_before: Vec<&str> = NOT_BEFORE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let not_after: Vec<&str> = NOT_AFTER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let keys: Vec<[&str; 3]> = PUB_BLOCK
        .captures_iter(text)
        .filter_map(|c| match (c.get(1), c.get(2), c.get(3)) {
            (Some(a), Some(b), Some(d)) => Some([a.as_str(), b.as_str(), d.as_str()]),
            _ => None,
        })
        .collect();

    if not_before.len() != not_after.len() || not_before.len() != keys.len() {
        return Err(CertError::InvalidDump(format!(
            "inconsistent dump: {} validity starts, {} validity ends, {} public keys",
            not_before.len(),
            not_after.len(),
            keys.len()
        )));
    }

    not_before
        .into_iter()
        .zip(not_after)
        .zip(keys)
        .map(|((start, end), key)| {
            Ok(DumpedCertificate {
                validity: ValidityWindow {
                    not_before: parse_toolkit_time(start)?,
                    not_after: parse_toolkit_time(end)?,
                },
                public_key: public_key_from_block(key)?,
            })
        })
        .collect()
}

/// Assign CA and node roles to the two certificates of a bundle.
///
/// The certificate whose key matches `ca_public_key` is the CA. Without a
/// known CA key, or when nothing matches, bundle order decides: node first,
/// CA second.
pub fn build_report(certs: &[DumpedCertificate], ca_public_key: Option<&str>) -> Result<CertificateReport> {
    if certs.len() != 2 {
        return Err(CertError::InvalidDump(format!(
            "expected 2 certificates in bundle, found {}",
            certs.len()
        )));
    }

    let matched = ca_public_key.and_then(|ca| {
        certs
            .iter()
            .position(|c| c.public_key.eq_ignore_ascii_case(ca))
    });
    let ca_index = match matched {
        Some(index) => index,
        None => {
            if ca_public_key.is_some() {
                warn!("CA public key not found in bundle, using bundle order");
            }
            1
        }
    };

    Ok(CertificateReport {
        ca: CertificateEntry::from_dump(&certs[ca_index])?,
        node: CertificateEntry::from_dump(&certs[1 - ca_index])?,
    })
}
