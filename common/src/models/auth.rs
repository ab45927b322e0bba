// common/src/models/auth.rs
use crate::address::Address;
use serde::{Deserialize, Serialize};

/// Query for `GET /auth-nonce`
#[derive(Debug, Clone, Deserialize)]
pub struct NonceQuery {
    pub address: Option<String>,
}

/// Challenge handed to the wallet. `issued_at` is echoed back verbatim on verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceChallenge {
    pub address: Address,
    pub nonce: String,
    pub issued_at: String,
}

/// Body of `POST /auth-verify`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: String,
    pub issued_at: Option<String>,
}
