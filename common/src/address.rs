// common/src/address.rs
//! Wallet address handling and EIP-191 ("personal_sign") signature recovery.
//!
//! The challenge message built here is the only thing a wallet signs during
//! login, so issuance and verification must produce it byte for byte.
use crate::error::AuthError;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

const ADDRESS_HEX_LEN: usize = 40;
const SIGNATURE_LEN: usize = 65;

/// A 20-byte account address, always held as `0x` + 40 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the address owning a secp256k1 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag; the address is the last 20 bytes of the hash.
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        Address(format!("0x{}", hex::encode(&hash[12..])))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_address(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize_address(&raw).map_err(serde::de::Error::custom)
    }
}

/// Validate and lowercase an address. Only `0x` followed by exactly 40 hex
/// digits is accepted; surrounding whitespace is ignored.
pub fn normalize_address(input: &str) -> Result<Address, AuthError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or(AuthError::InvalidAddress)?;

    if digits.len() != ADDRESS_HEX_LEN || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::InvalidAddress);
    }

    Ok(Address(format!("0x{}", digits.to_ascii_lowercase())))
}

/// Build the login challenge a wallet is asked to sign.
pub fn build_challenge_message(
    label: &str,
    address: &Address,
    nonce: &str,
    issued_at: Option<&str>,
) -> String {
    let mut message = format!(
        "{label} wants you to sign in with your wallet.\n\nAddress: {address}\nNonce: {nonce}"
    );
    if let Some(issued_at) = issued_at {
        message.push_str("\nIssued At: ");
        message.push_str(issued_at);
    }
    message
}

/// keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Recover the address that produced a personal_sign signature over `message`.
///
/// `signature` is 65 bytes `r || s || v` in hex, with or without `0x`.
/// `v` may be 0/1 or 27/28. Every malformed input maps to
/// [`AuthError::InvalidSignature`].
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
    let raw = signature.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|_| AuthError::InvalidSignature)?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(AuthError::InvalidSignature);
    }

    let v = match bytes[64] {
        0 | 1 => bytes[64],
        27 | 28 => bytes[64] - 27,
        _ => return Err(AuthError::InvalidSignature),
    };

    let signature = Signature::from_slice(&bytes[..64]).map_err(|_| AuthError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(v).ok_or(AuthError::InvalidSignature)?;

    // Wallets may hand out high-S signatures; flipping S flips the parity of R.
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(low) => (
            low,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let digest = personal_message_hash(message.as_bytes());
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|_| AuthError::InvalidSignature)?;

    Ok(Address::from_verifying_key(&key))
}
