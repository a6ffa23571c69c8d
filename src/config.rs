//! nodecert configuration
//!
//! ```toml
//! [paths]
//! cert_dir = "./cert"
//! vault_path = "./privatekeys.yaml"
//!
//! [identity]
//! ca_name = "my cool CA"
//! node_name = "node-01"      # defaults to the hostname
//!
//! [validity]
//! ca_days = 7300
//! node_days = 375
//!
//! [toolkit]
//! openssl_bin = "openssl"
//! min_version = "3.0.2"
//!
//! [vault]
//! retain_node_key_file = true
//! argon2_memory_kb = 65536
//! argon2_iterations = 3
//! argon2_parallelism = 4
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cipher::Argon2Settings;
use crate::lifecycle::Validity;
use crate::toolkit::openssl::DEFAULT_MIN_VERSION;

/// Node name used when none is configured and the hostname is unavailable.
pub const FALLBACK_NODE_NAME: &str = "my cool node name";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub validity: ValidityConfig,
    #[serde(default)]
    pub toolkit: ToolkitConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Certificate output directory
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// Private key vault file
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cert_dir: default_cert_dir(),
            vault_path: default_vault_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Common name of the CA certificate
    #[serde(default = "default_ca_name")]
    pub ca_name: String,

    /// Common name of the node certificate
    #[serde(default)]
    pub node_name: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            ca_name: default_ca_name(),
            node_name: None,
        }
    }
}

impl IdentityConfig {
    /// Configured node name, else the hostname, else a fixed fallback.
    pub fn resolved_node_name(&self) -> String {
        self.node_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| FALLBACK_NODE_NAME.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityConfig {
    #[serde(default = "default_ca_days")]
    pub ca_days: u32,

    #[serde(default = "default_node_days")]
    pub node_days: u32,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            ca_days: default_ca_days(),
            node_days: default_node_days(),
        }
    }
}

impl ValidityConfig {
    pub fn validity(&self) -> Validity {
        Validity {
            ca_days: self.ca_days,
            node_days: self.node_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// OpenSSL binary name or path
    #[serde(default = "default_openssl_bin")]
    pub openssl_bin: PathBuf,

    /// Oldest accepted OpenSSL version
    #[serde(default = "default_min_version")]
    pub min_version: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            openssl_bin: default_openssl_bin(),
            min_version: default_min_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Keep node.key.pem on disk after vaulting (the peer reads it)
    #[serde(default = "default_true")]
    pub retain_node_key_file: bool,

    #[serde(default = "default_argon2_memory_kb")]
    pub argon2_memory_kb: u32,

    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            retain_node_key_file: true,
            argon2_memory_kb: default_argon2_memory_kb(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl VaultConfig {
    pub fn argon2(&self) -> Argon2Settings {
        Argon2Settings {
            memory_kb: self.argon2_memory_kb,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// Defaults
fn default_cert_dir() -> PathBuf { PathBuf::from("./cert") }
fn default_vault_path() -> PathBuf { PathBuf::from("./privatekeys.yaml") }
fn default_ca_name() -> String { "my cool CA".to_string() }
fn default_ca_days() -> u32 { 7300 }
fn default_node_days() -> u32 { 375 }
fn default_openssl_bin() -> PathBuf { PathBuf::from("openssl") }
fn default_min_version() -> String { DEFAULT_MIN_VERSION.to_string() }
fn default_true() -> bool { true }
fn default_argon2_memory_kb() -> u32 { 64 * 1024 } // 64 MiB
fn default_argon2_iterations() -> u32 { 3 }
fn default_argon2_parallelism() -> u32 { 4 }

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
