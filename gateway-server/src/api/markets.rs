// gateway-server/src/api/markets.rs
use actix_web::{post, web, HttpResponse};
use common::models::deployment::{
    ClaimRequest, DbUpdate, DeployRequest, ReconcileRequest, RefundRequest, ResolveRequest,
};
use common::normalize_address;
use serde_json::json;
use crate::auth::AuthenticatedWallet;
use crate::deployment::run_deployment;
use crate::error::GatewayError;
use crate::orchestrator::params::{check_window, claim_env, record_id, refund_env, resolve_env, MAX_FEE_BPS};
use crate::orchestrator::ToolkitScript;
use crate::reconciler::MarketUpdate;
use crate::state::AppState;

async fn deploy(
    wallet: AuthenticatedWallet,
    body: web::Json<DeployRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    tracing::info!(wallet = %wallet.address, method = ?wallet.method, "Deployment requested");
    let response = run_deployment(&state, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/deploy-market")]
pub async fn deploy_market(
    wallet: AuthenticatedWallet,
    body: web::Json<DeployRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    deploy(wallet, body, state).await
}

// Same pipeline under the name the launch tooling calls
#[post("/launch-evm-market")]
pub async fn launch_evm_market(
    wallet: AuthenticatedWallet,
    body: web::Json<DeployRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    deploy(wallet, body, state).await
}

#[post("/resolve-market")]
pub async fn resolve_market(
    wallet: AuthenticatedWallet,
    body: web::Json<ResolveRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let market = normalize_address(&body.market_address)?;
    let env = resolve_env(&market, &body.result)?;

    tracing::info!(wallet = %wallet.address, %market, "Resolving market");
    let result = state.orchestrator.run(ToolkitScript::ResolveMarket, env).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[post("/claim-market")]
pub async fn claim_market(
    wallet: AuthenticatedWallet,
    body: web::Json<ClaimRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let market = normalize_address(&body.market_address)?;
    let claimant = match body.wallet.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
        Some(raw) => normalize_address(raw)?,
        None => wallet.address.clone(),
    };

    tracing::info!(wallet = %wallet.address, %market, %claimant, "Claiming from market");
    let result = state
        .orchestrator
        .run(ToolkitScript::ClaimMarket, claim_env(&market, &claimant))
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Operator refund for a resolved market. `direct` skips `claimFor` and pays
/// from the deployer wallet.
#[post("/refund-market")]
pub async fn refund_market(
    wallet: AuthenticatedWallet,
    body: web::Json<RefundRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let market = normalize_address(&body.market_address)?;
    let recipient = match body.wallet.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
        Some(raw) => normalize_address(raw)?,
        None => wallet.address.clone(),
    };

    tracing::info!(wallet = %wallet.address, %market, %recipient, direct = body.direct, "Refund requested");
    let result = state
        .orchestrator
        .run(ToolkitScript::ManualRefund, refund_env(&market, &recipient, body.direct))
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

// Retry the datastore write for an already deployed market
#[post("/reconcile-market")]
pub async fn reconcile_market(
    wallet: AuthenticatedWallet,
    body: web::Json<ReconcileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let request = body.into_inner();
    let pick_id = record_id(&request.pick_id)?;
    let creds = state.reconciler.credentials(request.datastore.as_ref())?;

    let mut market = request.market;
    market.market_address = normalize_address(&market.market_address)?.to_string();
    for share in [&mut market.yes_share_address, &mut market.no_share_address] {
        if let Some(raw) = share.take() {
            *share = Some(normalize_address(&raw)?.to_string());
        }
    }
    if request.fee_bps > MAX_FEE_BPS {
        return Err(GatewayError::BadRequest(format!("feeBps must be between 0 and {}", MAX_FEE_BPS)));
    }
    check_window(request.end_time, request.cutoff_time)?;

    tracing::info!(wallet = %wallet.address, %pick_id, "Reconcile retry requested");
    let update = MarketUpdate::deployed(&market, request.fee_bps, request.end_time, request.cutoff_time);
    let outcome = state
        .reconciler
        .reconcile(&pick_id, creds.as_ref(), &update)
        .await;

    let body = json!({
        "success": outcome.db_update != DbUpdate::Failed,
        "pickId": pick_id,
        "marketAddress": market.market_address,
        "dbUpdate": outcome.db_update,
        "dbError": outcome.db_error,
    });
    if outcome.db_update == DbUpdate::Failed {
        Ok(HttpResponse::BadGateway().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}
