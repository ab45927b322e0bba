// gateway-server/src/utils/token.rs
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Mixed into the PIN hash so a PIN change (or a bump here) ends all sessions.
const ADMIN_SESSION_VERSION: &str = ":admin-session:v1";

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 128 bits from the OS RNG, hex encoded
pub fn generate_nonce() -> String {
    random_hex::<16>()
}

/// Opaque admin session id, 256 bits from the OS RNG
pub fn create_session_token() -> String {
    random_hex::<32>()
}

/// Hash a string using SHA-256
pub fn hash_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Deterministic fingerprint of the admin PIN that sessions are bound to
pub fn session_epoch(pin: &str) -> String {
    hash_string(&format!("{}{}", pin, ADMIN_SESSION_VERSION))
}

/// Equality without early exit, for secrets
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
