// gateway-server/src/api/status.rs
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;
use crate::state::AppState;

#[get("/")]
pub async fn index(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Market Operations Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "walletAuth": state.verifier.is_some(),
        "devFallback": state.dev_fallback,
        "deploymentsRunning": state.orchestrator.in_flight().len(),
    }))
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

#[get("/healthz")]
pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}
