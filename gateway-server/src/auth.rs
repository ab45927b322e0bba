// gateway-server/src/auth.rs
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use common::{normalize_address, Address, AuthError};
use futures_util::future::{ready, Ready};
use crate::error::GatewayError;
use crate::state::AppState;

/// Header carrying a bare wallet address when the dev fallback is on
pub const DEV_WALLET_HEADER: &str = "x-wallet-address";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer,
    DevFallback,
}

/// Wallet behind a privileged request. Extracting it is the auth check.
#[derive(Debug, Clone)]
pub struct AuthenticatedWallet {
    pub address: Address,
    pub method: AuthMethod,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

/// First well-formed address from the header, then the query parameter.
fn claimed_address(req: &HttpRequest) -> Option<Address> {
    let header = req
        .headers()
        .get(DEV_WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query = web::Query::<std::collections::HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.get("address").cloned());

    [header, query]
        .into_iter()
        .flatten()
        .find_map(|raw| normalize_address(&raw).ok())
}

/// Bearer token first; then, only with the dev fallback on, an address from
/// the `x-wallet-address` header or `address` query parameter.
pub fn authenticate(req: &HttpRequest, state: &AppState) -> Result<AuthenticatedWallet, GatewayError> {
    if let Some(token) = bearer_token(req) {
        match &state.verifier {
            Some(verifier) => match verifier.verify(token) {
                Ok(verified) => {
                    return Ok(AuthenticatedWallet {
                        address: verified.address,
                        method: AuthMethod::Bearer,
                    })
                },
                Err(e) => tracing::debug!("Rejected bearer token: {}", e),
            },
            None => tracing::warn!("Bearer token presented but no signing secret is configured"),
        }
    }

    if state.dev_fallback {
        if let Some(address) = claimed_address(req) {
            tracing::warn!(%address, "Accepting unauthenticated wallet via dev fallback");
            return Ok(AuthenticatedWallet {
                address,
                method: AuthMethod::DevFallback,
            });
        }
    }

    Err(GatewayError::Unauthenticated)
}

impl FromRequest for AuthenticatedWallet {
    type Error = GatewayError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match req.app_data::<web::Data<AppState>>() {
            Some(state) => authenticate(req, state),
            None => {
                tracing::error!("AppState missing from app data");
                Err(GatewayError::Auth(AuthError::ConfigMissing(vec!["app state".to_string()])))
            },
        };
        ready(result)
    }
}
