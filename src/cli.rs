//! nodecert CLI - generate, renew and inspect node certificates, and manage
//! the private key vault.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cipher::PasswordCipher;
use crate::config::Config;
use crate::lifecycle::{
    CertificateBundle, CertificateEntry, CertificateLifecycleManager, CertificateReport,
    GenerateRequest, RenewRequest,
};
use crate::toolkit::OpenSslToolkit;
use crate::vault::{PrivateKeyVault, VaultRecord};

const RULE: &str = "==================================================";

#[derive(Debug, Parser)]
#[command(name = "nodecert")]
#[command(about = "Issue and renew node CA/transport certificates with a password-protected key vault")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "nodecert.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the certificate directory, keys and certificates
    Generate {
        /// Certificate output directory
        #[arg(short = 'd', long)]
        cert_dir: Option<PathBuf>,

        /// CA common name
        #[arg(long)]
        ca_name: Option<String>,

        /// Node common name
        #[arg(long)]
        node_name: Option<String>,

        /// CA certificate validity in days
        #[arg(long)]
        ca_days: Option<u32>,

        /// Node certificate validity in days
        #[arg(long)]
        node_days: Option<u32>,

        /// Replace an existing certificate directory
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Re-issue certificates with the keys stored in the vault
    Renew {
        /// Certificate directory
        #[arg(short = 'd', long)]
        cert_dir: Option<PathBuf>,

        /// CA certificate validity in days
        #[arg(long)]
        ca_days: Option<u32>,

        /// Node certificate validity in days
        #[arg(long)]
        node_days: Option<u32>,

        #[command(flatten)]
        vault: VaultArgs,
    },

    /// Show validity, public keys and addresses of the issued certificates
    Info {
        /// Certificate directory
        #[arg(short = 'd', long)]
        cert_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Private key vault operations
    #[command(subcommand)]
    Vault(VaultCommands),
}

/// Vault location and password shared by several commands.
#[derive(Debug, Args)]
pub struct VaultArgs {
    /// Private key vault file
    #[arg(long)]
    pub vault_path: Option<PathBuf>,

    /// Vault password (empty stores keys unencrypted)
    #[arg(short, long, env = "NODECERT_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Subcommand)]
pub enum VaultCommands {
    /// Encrypt a plaintext vault file
    Encrypt {
        #[command(flatten)]
        vault: VaultArgs,

        /// Output file (defaults to the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a vault file into plaintext
    Decrypt {
        #[command(flatten)]
        vault: VaultArgs,

        /// Output file (defaults to the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-encrypt a vault file under a new password
    ChangePassword {
        #[command(flatten)]
        vault: VaultArgs,

        /// New vault password
        #[arg(long, env = "NODECERT_NEW_PASSWORD", default_value = "", hide_env_values = true)]
        new_password: String,

        /// Output file (defaults to the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Directives applied when `RUST_LOG` is unset or unusable.
pub const DEFAULT_LOG_FILTER: &str = "nodecert=info";

/// Log filter from `RUST_LOG`-style directives, falling back to
/// [`DEFAULT_LOG_FILTER`].
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn vault_from_config(config: &Config) -> PrivateKeyVault<PasswordCipher> {
    PrivateKeyVault::new(PasswordCipher::new(config.vault.argon2()))
        .with_node_key_retention(config.vault.retain_node_key_file)
}

fn manager_from_config(config: &Config) -> CertificateLifecycleManager<OpenSslToolkit, PasswordCipher> {
    let toolkit = OpenSslToolkit::new(
        config.toolkit.openssl_bin.clone(),
        config.toolkit.min_version.clone(),
    );
    CertificateLifecycleManager::new(toolkit, vault_from_config(config))
}

/// Execute a CLI command and return the text to print.
pub fn execute_command(config: &Config, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Generate {
            cert_dir,
            ca_name,
            node_name,
            ca_days,
            node_days,
            force,
            vault,
        } => {
            let mut validity = config.validity.validity();
            validity.ca_days = ca_days.unwrap_or(validity.ca_days);
            validity.node_days = node_days.unwrap_or(validity.node_days);

            let request = GenerateRequest {
                cert_dir: cert_dir.unwrap_or_else(|| config.paths.cert_dir.clone()),
                ca_name: ca_name.unwrap_or_else(|| config.identity.ca_name.clone()),
                node_name: node_name.unwrap_or_else(|| config.identity.resolved_node_name()),
                validity,
                overwrite: force,
                vault_path: vault.vault_path.unwrap_or_else(|| config.paths.vault_path.clone()),
                password: vault.password,
            };
            info!(node_name = %request.node_name, "Generating certificates");
            let bundle = manager_from_config(config).generate(&request)?;
            Ok(format_bundle("Certificates generated", &bundle))
        }

        Commands::Renew {
            cert_dir,
            ca_days,
            node_days,
            vault,
        } => {
            let mut validity = config.validity.validity();
            validity.ca_days = ca_days.unwrap_or(validity.ca_days);
            validity.node_days = node_days.unwrap_or(validity.node_days);

            let request = RenewRequest {
                cert_dir: cert_dir.unwrap_or_else(|| config.paths.cert_dir.clone()),
                validity,
                vault_path: vault.vault_path.unwrap_or_else(|| config.paths.vault_path.clone()),
                password: vault.password,
            };
            let bundle = manager_from_config(config).renew(&request)?;
            Ok(format_bundle("Certificates renewed", &bundle))
        }

        Commands::Info { cert_dir, json } => {
            let cert_dir = cert_dir.unwrap_or_else(|| config.paths.cert_dir.clone());
            let report = manager_from_config(config).info(&cert_dir)?;
            if json {
                Ok(serde_json::to_string_pretty(&report)?)
            } else {
                Ok(format_report(&report))
            }
        }

        Commands::Vault(cmd) => execute_vault_command(config, cmd),
    }
}

fn execute_vault_command(config: &Config, command: VaultCommands) -> anyhow::Result<String> {
    let vault = vault_from_config(config);
    match command {
        VaultCommands::Encrypt { vault: args, output } => {
            let input = args.vault_path.unwrap_or_else(|| config.paths.vault_path.clone());
            let output = output.unwrap_or_else(|| input.clone());
            let record = vault.encrypt_file(&input, &output, &args.password)?;
            Ok(format_vault("Vault encrypted", &output, &record))
        }
        VaultCommands::Decrypt { vault: args, output } => {
            let input = args.vault_path.unwrap_or_else(|| config.paths.vault_path.clone());
            let output = output.unwrap_or_else(|| input.clone());
            let record = vault.decrypt_file(&input, &output, &args.password)?;
            Ok(format_vault("Vault decrypted", &output, &record))
        }
        VaultCommands::ChangePassword {
            vault: args,
            new_password,
            output,
        } => {
            let input = args.vault_path.unwrap_or_else(|| config.paths.vault_path.clone());
            let output = output.unwrap_or_else(|| input.clone());
            let record = vault.rotate_to(&input, &output, &args.password, &new_password)?;
            Ok(format_vault("Vault password changed", &output, &record))
        }
    }
}

fn push_entry(out: &mut String, title: &str, entry: &CertificateEntry) {
    let _ = writeln!(out, "{title}:");
    let _ = writeln!(out, "       Start Date: {}", entry.not_before);
    let _ = writeln!(out, "         End Date: {}", entry.not_after);
    let _ = writeln!(out, "       Public Key: {}", entry.public_key);
    let _ = writeln!(out, "  Mainnet Address: {}", entry.mainnet_address);
    let _ = writeln!(out, "  Testnet Address: {}", entry.testnet_address);
}

/// Human-readable certificate report.
pub fn format_report(report: &CertificateReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    push_entry(&mut out, "CA Cert", &report.ca);
    push_entry(&mut out, "Node Cert", &report.node);
    out.push_str(RULE);
    out
}

fn format_bundle(headline: &str, bundle: &CertificateBundle) -> String {
    format!(
        "{headline}\n  CA Cert:   {} .. {}\n  Node Cert: {} .. {}",
        bundle.ca_validity.not_before,
        bundle.ca_validity.not_after,
        bundle.node_validity.not_before,
        bundle.node_validity.not_after,
    )
}

fn format_vault(headline: &str, path: &std::path::Path, record: &VaultRecord) -> String {
    let mut out = format!("{headline}: {}", path.display());
    for (section, entry) in [("main", &record.main), ("transport", &record.transport)] {
        if let Some(entry) = entry {
            let _ = write!(
                out,
                "\n  {section}: {} ({})",
                entry.mainnet_address.as_deref().unwrap_or("-"),
                if entry.encrypted == Some(true) { "encrypted" } else { "plaintext" }
            );
        }
    }
    out
}
