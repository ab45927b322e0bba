// common/src/error.rs
use thiserror::Error;

/// Failures of the wallet authentication path.
///
/// Display strings stay generic: they end up in responses to
/// unauthenticated callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid address")]
    InvalidAddress,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("missing configuration: {}", .0.join(", "))]
    ConfigMissing(Vec<String>),
}
