// gateway-server/src/api/wallet_auth.rs
use actix_web::{get, post, web, HttpResponse};
use common::models::auth::{NonceQuery, VerifyRequest};
use common::{build_challenge_message, normalize_address, recover_signer, AuthError};
use crate::error::GatewayError;
use crate::nonce_registry::{ConsumeNonce, IssueNonce};
use crate::state::AppState;

fn mailbox_error(e: actix::MailboxError) -> GatewayError {
    GatewayError::Internal(format!("nonce registry unavailable: {}", e))
}

// Issue a single-use challenge nonce for a wallet
#[get("/auth-nonce")]
pub async fn auth_nonce(
    query: web::Query<NonceQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let raw = query.address.as_deref().unwrap_or_default();
    let address = normalize_address(raw)?;

    let challenge = state
        .nonces
        .send(IssueNonce { address })
        .await
        .map_err(mailbox_error)?;

    tracing::debug!(address = %challenge.address, "Issued login nonce");
    Ok(HttpResponse::Ok().json(challenge))
}

// Exchange a signed challenge for a bearer credential
#[post("/auth-verify")]
pub async fn auth_verify(
    body: web::Json<VerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let request = body.into_inner();
    let address = normalize_address(&request.address)?;
    if request.nonce.trim().is_empty() || request.signature.trim().is_empty() {
        return Err(GatewayError::BadRequest("nonce and signature are required".to_string()));
    }

    let verifier = state
        .verifier
        .as_ref()
        .ok_or_else(|| AuthError::ConfigMissing(vec!["AUTH_SECRET".to_string()]))?;

    // Consumed before the signature check: a failed attempt burns the nonce.
    let issued_at = state
        .nonces
        .send(ConsumeNonce {
            address: address.clone(),
            nonce: request.nonce.clone(),
        })
        .await
        .map_err(mailbox_error)?
        .map_err(|rejection| {
            tracing::info!(%address, "Login rejected: {}", rejection);
            AuthError::InvalidSignature
        })?;

    if let Some(claimed) = request.issued_at.as_deref().filter(|s| !s.is_empty()) {
        if claimed != issued_at {
            tracing::info!(%address, "Login rejected: issuedAt does not match the challenge");
            return Err(AuthError::InvalidSignature.into());
        }
    }

    let message = build_challenge_message(
        &state.config.auth.challenge_label,
        &address,
        request.nonce.trim(),
        Some(&issued_at),
    );
    let signer = recover_signer(&message, &request.signature)?;
    if signer != address {
        tracing::info!(%address, %signer, "Login rejected: signer mismatch");
        return Err(AuthError::InvalidSignature.into());
    }

    let credential = verifier.issue(&address)?;
    tracing::info!(%address, "Wallet authenticated");
    Ok(HttpResponse::Ok().json(credential))
}
