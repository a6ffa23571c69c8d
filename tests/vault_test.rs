//! Private key vault integration tests: persist/restore/rotate on disk

mod common;

use std::path::Path;

use tempfile::TempDir;

use common::{fast_vault, FakeToolkit};
use nodecert::toolkit::KeyGenerator;
use nodecert::{CertError, KeyFiles, KeyRole, VaultEntry, VaultRecord};

fn key_files(dir: &Path) -> KeyFiles {
    KeyFiles::new(dir.join("ca.key.pem"), dir.join("node.key.pem"))
}

/// Generate both key files and return their bytes.
fn generate_keys(toolkit: &FakeToolkit, files: &KeyFiles) -> [Vec<u8>; 2] {
    KeyRole::ALL.map(|role| {
        toolkit.generate_private_key(files.path(role)).unwrap();
        std::fs::read(files.path(role)).unwrap()
    })
}

#[test]
fn test_persist_then_restore_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("privatekeys.yaml");
    let toolkit = FakeToolkit::default();
    let vault = fast_vault().with_node_key_retention(false);

    let original = generate_keys(&toolkit, &files);
    vault.persist(&vault_path, &files, "pw", &toolkit).unwrap();
    assert!(!files.ca.exists());
    assert!(!files.node.exists());

    let written = vault.restore(&vault_path, &files, "pw").unwrap();
    assert_eq!(written, vec![KeyRole::Ca, KeyRole::Node]);
    assert_eq!(std::fs::read(&files.ca).unwrap(), original[0]);
    assert_eq!(std::fs::read(&files.node).unwrap(), original[1]);
}

#[test]
fn test_persist_keeps_node_key_by_default() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let toolkit = FakeToolkit::default();
    let vault = fast_vault();
    assert!(vault.retains_node_key_file());

    generate_keys(&toolkit, &files);
    vault
        .persist(&dir.path().join("pk.yaml"), &files, "pw", &toolkit)
        .unwrap();

    assert!(!files.ca.exists());
    assert!(files.node.exists());
}

#[test]
fn test_rotate_then_restore_with_new_password() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("pk.yaml");
    let toolkit = FakeToolkit::default();
    let vault = fast_vault().with_node_key_retention(false);

    let original = generate_keys(&toolkit, &files);
    vault.persist(&vault_path, &files, "old", &toolkit).unwrap();

    vault.rotate(&vault_path, "old", "new").unwrap();

    assert!(matches!(
        vault.restore(&vault_path, &files, "old"),
        Err(CertError::AuthenticationFailed { .. })
    ));
    vault.restore(&vault_path, &files, "new").unwrap();
    assert_eq!(std::fs::read(&files.ca).unwrap(), original[0]);
    assert_eq!(std::fs::read(&files.node).unwrap(), original[1]);
}

#[test]
fn test_rotate_to_separate_output_leaves_input() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let input = dir.path().join("pk.yaml");
    let output = dir.path().join("rotated.yaml");
    let toolkit = FakeToolkit::default();
    let vault = fast_vault();

    generate_keys(&toolkit, &files);
    vault.persist(&input, &files, "old", &toolkit).unwrap();
    let before = std::fs::read(&input).unwrap();

    vault.rotate_to(&input, &output, "old", "new").unwrap();

    assert_eq!(std::fs::read(&input).unwrap(), before);
    let rotated = VaultRecord::load(&output).unwrap();
    assert!(vault.decrypt_record(&rotated, "new").is_ok());
}

#[test]
fn test_restore_never_overwrites_existing_key_file() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("pk.yaml");
    let toolkit = FakeToolkit::default();
    let vault = fast_vault().with_node_key_retention(false);

    generate_keys(&toolkit, &files);
    vault.persist(&vault_path, &files, "pw", &toolkit).unwrap();

    std::fs::write(&files.ca, "live key").unwrap();
    let written = vault.restore(&vault_path, &files, "pw").unwrap();

    assert_eq!(written, vec![KeyRole::Node]);
    assert_eq!(std::fs::read_to_string(&files.ca).unwrap(), "live key");
}

#[test]
fn test_restore_skips_roles_without_data() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("pk.yaml");
    let record = VaultRecord {
        main: Some(VaultEntry {
            private_key: "9D61B19DEFFD5A60BA844AF492EC2CC44449C5697B326919703BAC031CAE7F60".to_string(),
            encrypted: Some(false),
            ..Default::default()
        }),
        transport: Some(VaultEntry::default()),
    };
    record.save(&vault_path).unwrap();

    let written = fast_vault().restore(&vault_path, &files, "").unwrap();

    assert_eq!(written, vec![KeyRole::Ca]);
    assert!(files.ca.exists());
    assert!(!files.node.exists());
}

#[test]
fn test_restore_missing_vault() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    assert!(matches!(
        fast_vault().restore(&dir.path().join("absent.yaml"), &files, "pw"),
        Err(CertError::VaultNotFound(_))
    ));
}

#[test]
fn test_restore_rejects_corrupted_ciphertext() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("pk.yaml");
    let toolkit = FakeToolkit::default();
    let vault = fast_vault().with_node_key_retention(false);

    generate_keys(&toolkit, &files);
    let mut record = vault.persist(&vault_path, &files, "pw", &toolkit).unwrap();
    if let Some(entry) = record.transport.as_mut() {
        entry.private_key.truncate(entry.private_key.len() - 2);
    }
    record.save(&vault_path).unwrap();

    let err = vault.restore(&vault_path, &files, "pw").unwrap_err();
    assert!(matches!(
        err,
        CertError::KeyIntegrity { role: KeyRole::Node, .. } | CertError::AuthenticationFailed { role: KeyRole::Node }
    ));
}

#[test]
fn test_empty_password_vault_is_plaintext() {
    let dir = TempDir::new().unwrap();
    let files = key_files(dir.path());
    let vault_path = dir.path().join("pk.yaml");
    let toolkit = FakeToolkit::default();

    generate_keys(&toolkit, &files);
    let record = fast_vault().persist(&vault_path, &files, "", &toolkit).unwrap();

    let ca = record.entry(KeyRole::Ca).unwrap();
    assert_eq!(ca.encrypted, Some(false));
    assert_eq!(ca.private_key.len(), 64);

    let yaml = std::fs::read_to_string(&vault_path).unwrap();
    assert!(yaml.contains("encrypted: false"));
}

#[test]
fn test_encrypt_and_decrypt_legacy_file() {
    let dir = TempDir::new().unwrap();
    let plain_path = dir.path().join("plain.yaml");
    let sealed_path = dir.path().join("sealed.yaml");
    let restored_path = dir.path().join("restored.yaml");

    // Hand-written document in the older format without the encrypted flag
    std::fs::write(
        &plain_path,
        "main:\n  privateKey: 9D61B19DEFFD5A60BA844AF492EC2CC44449C5697B326919703BAC031CAE7F60\n  \
         publicKey: D75A980182B10AB7D54BFED3C964073A0EE172F3DAA62325AF021A68F707511A\n",
    )
    .unwrap();

    let vault = fast_vault();
    let sealed = vault.encrypt_file(&plain_path, &sealed_path, "pw").unwrap();
    let main = sealed.entry(KeyRole::Ca).unwrap();
    assert_eq!(main.encrypted, Some(true));
    assert_eq!(
        main.mainnet_address.as_deref(),
        Some("NBDHG3NHBCNLOAAK4OJFQALFUZUTWNE4ERJ4C2A")
    );
    assert_eq!(
        main.testnet_address.as_deref(),
        Some("TBDHG3NHBCNLOAAK4OJFQALFUZUTWNE4ESDA7WA")
    );

    let plain = vault.decrypt_file(&sealed_path, &restored_path, "pw").unwrap();
    assert_eq!(
        plain.entry(KeyRole::Ca).unwrap().private_key,
        "9D61B19DEFFD5A60BA844AF492EC2CC44449C5697B326919703BAC031CAE7F60"
    );
    assert!(plain.transport.is_none());
    assert_eq!(VaultRecord::load(&restored_path).unwrap(), plain);
}
