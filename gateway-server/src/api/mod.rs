// gateway-server/src/api/mod.rs
pub mod markets;
pub mod status;
pub mod wallet_auth;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use crate::error::GatewayError;

/// Malformed JSON bodies answer in the same `{error}` shape as everything else.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    GatewayError::BadRequest(format!("invalid request body: {}", err)).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(64 * 1024).error_handler(json_error))
        .service(status::index)
        .service(status::health)
        .service(status::healthz)
        .service(wallet_auth::auth_nonce)
        .service(wallet_auth::auth_verify)
        .service(
            web::scope("/api")
                .service(markets::deploy_market)
                .service(markets::launch_evm_market)
                .service(markets::resolve_market)
                .service(markets::claim_market)
                .service(markets::refund_market)
                .service(markets::reconcile_market),
        );
}
