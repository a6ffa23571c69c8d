//! Account address derivation
//!
//! An account address is derived from a 32-byte public key:
//! 1. `SHA3-256(public_key)`
//! 2. `RIPEMD-160` of that digest
//! 3. prefix the network identifier byte
//! 4. append the first 3 bytes of `SHA3-256` over the prefixed hash
//! 5. base32 (RFC 4648, no padding) → 39 characters

use data_encoding::BASE32_NOPAD;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::error::{CertError, Result};

const CHECKSUM_LEN: usize = 3;
const DECODED_LEN: usize = 1 + 20 + CHECKSUM_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn identifier(&self) -> u8 {
        match self {
            Network::Mainnet => 0x68,
            Network::Testnet => 0x98,
        }
    }
}

/// Mainnet and testnet addresses for one public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddresses {
    pub mainnet: String,
    pub testnet: String,
}

pub fn address_from_public_key(public_key: &[u8; 32], network: Network) -> String {
    let key_hash = Sha3_256::digest(public_key);
    let ripemd_hash = Ripemd160::digest(key_hash);

    let mut decoded = Vec::with_capacity(DECODED_LEN);
    decoded.push(network.identifier());
    decoded.extend_from_slice(&ripemd_hash);

    let checksum = Sha3_256::digest(&decoded);
    decoded.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    BASE32_NOPAD.encode(&decoded)
}

/// Derive both network addresses from a 64-hex-character public key.
pub fn derive_addresses(public_key_hex: &str) -> Result<AccountAddresses> {
    let mut public_key = [0u8; 32];
    hex::decode_to_slice(public_key_hex, &mut public_key).map_err(|e| {
        CertError::InvalidPublicKey(format!("{public_key_hex:?} is not 32 bytes of hex: {e}"))
    })?;

    Ok(AccountAddresses {
        mainnet: address_from_public_key(&public_key, Network::Mainnet),
        testnet: address_from_public_key(&public_key, Network::Testnet),
    })
}

/// Check the network byte and checksum of an encoded address.
pub fn is_valid_address(address: &str, network: Network) -> bool {
    let Ok(decoded) = BASE32_NOPAD.decode(address.as_bytes()) else {
        return false;
    };
    if decoded.len() != DECODED_LEN || decoded[0] != network.identifier() {
        return false;
    }
    let (body, checksum) = decoded.split_at(DECODED_LEN - CHECKSUM_LEN);
    Sha3_256::digest(body)[..CHECKSUM_LEN] == *checksum
}
