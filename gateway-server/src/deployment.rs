// gateway-server/src/deployment.rs
//! Deploy pipeline shared by the API and the admin launch form.
use chrono::Utc;
use common::models::deployment::{DbUpdate, DeployRequest, DeployResponse, DeployedMarket, ReconcileOutcome};
use common::normalize_address;
use serde_json::{Map, Value};
use crate::error::GatewayError;
use crate::orchestrator::params::{deploy_env, record_id, resolve_params};
use crate::reconciler::MarketUpdate;
use crate::state::AppState;

/// First present, valid address among `keys`.
fn address_field(result: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| result.get(*key).and_then(Value::as_str))
        .find_map(|raw| normalize_address(raw).ok())
        .map(|address| address.to_string())
}

/// Addresses out of the toolkit's result object.
pub fn extract_market(result: &Map<String, Value>) -> Result<DeployedMarket, GatewayError> {
    let market_address = address_field(result, &["marketAddress"]).ok_or_else(|| GatewayError::DeployFailed {
        exit_code: Some(0),
        result: Some(Value::Object(result.clone())),
        output_tail: "toolkit reported success without a valid marketAddress".to_string(),
    })?;

    Ok(DeployedMarket {
        market_address,
        yes_share_address: address_field(result, &["yesShareAddress", "yesShare"]),
        no_share_address: address_field(result, &["noShareAddress", "noShare"]),
    })
}

/// Validate, deploy, then record the market on its pick when one is given.
///
/// At most one deployment runs per pick; a second request for the same pick
/// gets 409 until the first finishes. A datastore failure is reported in the
/// response, never as an error.
pub async fn run_deployment(state: &AppState, request: DeployRequest) -> Result<DeployResponse, GatewayError> {
    let pick_id = request.pick_id.as_ref().map(record_id).transpose()?;
    let creds = state.reconciler.credentials(request.datastore.as_ref())?;
    let _guard = match &pick_id {
        Some(id) => Some(state.orchestrator.in_flight().try_acquire(id)?),
        None => None,
    };

    let window = state
        .reconciler
        .derive_window(pick_id.as_deref(), creds.as_ref(), Utc::now())
        .await;
    let params = resolve_params(&request, state.orchestrator.config(), window)?;

    let script = state.orchestrator.deploy_script();
    tracing::info!(
        script = script.path(),
        pick_id = ?params.pick_id,
        fee_bps = params.fee_bps,
        end_time = params.end_time,
        cutoff_time = params.cutoff_time,
        "Deploying market"
    );
    let result = state
        .orchestrator
        .run(script, deploy_env(&params))
        .await?;
    let market = extract_market(&result)?;
    tracing::info!(market = %market.market_address, "Market deployed");

    let reconcile = match &params.pick_id {
        Some(id) => {
            let update = MarketUpdate::deployed(&market, params.fee_bps, params.end_time, params.cutoff_time);
            state.reconciler.reconcile(id, creds.as_ref(), &update).await
        },
        None => ReconcileOutcome {
            db_update: DbUpdate::Skipped,
            db_error: None,
        },
    };

    Ok(DeployResponse {
        success: true,
        market,
        fee_bps: params.fee_bps,
        end_time: params.end_time,
        cutoff_time: params.cutoff_time,
        pick_id: params.pick_id,
        reconcile,
    })
}
