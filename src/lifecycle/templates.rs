//! Toolkit configuration files written into the certificate directory.

use std::path::Path;

use super::layout::CertLayout;

/// Config values treat `\` as an escape character.
fn config_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}

/// CA config: signing policy, ledger locations and the CA request subject.
pub fn ca_config(layout: &CertLayout, ca_name: &str) -> String {
    format!(
        "[ca]
default_ca = CA_default

[CA_default]
new_certs_dir = {new_certs}

database = {database}
serial   = {serial}
private_key = {private_key}
certificate = {certificate}
policy = policy_catapult

[policy_catapult]
commonName = supplied

[req]
prompt = no
distinguished_name = dn

[dn]
CN = {ca_name}
",
        new_certs = config_path(&layout.new_certs_dir()),
        database = config_path(&layout.ledger()),
        serial = config_path(&layout.serial()),
        private_key = config_path(&layout.ca_key()),
        certificate = config_path(&layout.ca_cert()),
    )
}

/// Node request config with the node's common name.
pub fn node_config(node_name: &str) -> String {
    format!(
        "[req]
prompt = no
distinguished_name = dn
[dn]
CN = {node_name}
"
    )
}
