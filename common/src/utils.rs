// common/src/utils.rs
use crate::address::{normalize_address, Address};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::runtime::RuntimeMarkers;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Bearer credentials live for three days; there is no refresh.
pub const CREDENTIAL_TTL_SECS: i64 = 3 * 24 * 3600;

/// Publicly known signing secret, only ever used in development contexts.
pub const DEV_AUTH_SECRET: &str = "dev-insecure-auth-secret";

/// Setup tracing for consistent logging across services.
/// `RUST_LOG` overrides the default `info` level.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String, // wallet address
    pub iat: u64,    // issued at time
    pub exp: u64,    // expiration time
}

/// Where the token signing secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Dedicated,
    AdminPin,
    DevelopmentDefault,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub token: String,
    pub address: Address,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedCredential {
    pub address: Address,
    pub claims: JwtClaims,
}

/// Issues and checks HS256 bearer tokens bound to a wallet address.
#[derive(Clone)]
pub struct CredentialVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    source: SecretSource,
}

impl CredentialVerifier {
    pub fn new(secret: &[u8], source: SecretSource) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            source,
        }
    }

    /// Pick the signing secret: dedicated secret, then admin PIN, then the
    /// development default. The default is refused outside development.
    pub fn from_config(auth: &AuthConfig, markers: &RuntimeMarkers) -> Result<Self, AuthError> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        if let Some(secret) = non_empty(&auth.secret) {
            return Ok(Self::new(secret.as_bytes(), SecretSource::Dedicated));
        }
        if let Some(pin) = non_empty(&auth.admin_pin) {
            tracing::warn!("AUTH_SECRET unset, signing bearer tokens with the admin PIN");
            return Ok(Self::new(pin.as_bytes(), SecretSource::AdminPin));
        }
        if markers.is_development() {
            tracing::warn!("AUTH_SECRET unset, using the development signing secret");
            return Ok(Self::new(DEV_AUTH_SECRET.as_bytes(), SecretSource::DevelopmentDefault));
        }

        Err(AuthError::ConfigMissing(vec!["AUTH_SECRET".to_string()]))
    }

    pub fn source(&self) -> SecretSource {
        self.source
    }

    pub fn issue(&self, address: &Address) -> Result<IssuedCredential, AuthError> {
        self.issue_at(address, Utc::now())
    }

    /// Issue a credential as if the current time were `now`.
    pub fn issue_at(&self, address: &Address, now: DateTime<Utc>) -> Result<IssuedCredential, AuthError> {
        let iat = now.timestamp();
        let exp = iat + CREDENTIAL_TTL_SECS;

        let claims = JwtClaims {
            sub: address.to_string(),
            iat: u64::try_from(iat).map_err(|_| AuthError::InvalidToken)?,
            exp: u64::try_from(exp).map_err(|_| AuthError::InvalidToken)?,
        };

        let token = encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to encode bearer token: {}", e);
            AuthError::InvalidToken
        })?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .unwrap_or_else(|| now + Duration::seconds(CREDENTIAL_TTL_SECS));

        Ok(IssuedCredential {
            token,
            address: address.clone(),
            expires_at,
        })
    }

    /// Check signature and expiry, then re-validate the subject as an address.
    pub fn verify(&self, token: &str) -> Result<VerifiedCredential, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<JwtClaims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })?;

        let address = normalize_address(&data.claims.sub).map_err(|_| AuthError::InvalidToken)?;

        Ok(VerifiedCredential {
            address,
            claims: data.claims,
        })
    }
}
