// gateway-server/src/orchestrator/params.rs
//! Validation of request-derived values before they become toolkit env vars.
use crate::error::GatewayError;
use crate::reconciler::window::TimeWindow;
use common::models::deployment::{DeployParams, DeployRequest};
use common::{normalize_address, Address, ToolkitConfig};
use serde_json::Value;
use std::collections::BTreeMap;

/// Environment handed to the toolkit process
pub type ToolkitEnv = BTreeMap<String, String>;

pub const MAX_FEE_BPS: u32 = 10_000;
const MAX_NAME_PREFIX_CHARS: usize = 64;

/// Outcome keywords accepted by the resolve script
const RESOLVE_OUTCOMES: &[&str] = &["less", "under", "yes", "more", "over", "no", "void", "invalid"];

/// Accept a JSON number or numeric string that is a finite value, truncated
/// toward zero. NaN, infinities, booleans and text are rejected.
pub fn finite_number(value: &Value, field: &str) -> Result<i64, GatewayError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n.abs() < i64::MAX as f64 => Ok(n.trunc() as i64),
        _ => Err(GatewayError::BadRequest(format!("{} must be a finite number", field))),
    }
}

/// A unix timestamp in seconds between the epoch and `TimeWindow::MAX_TIMESTAMP`.
pub fn timestamp(value: &Value, field: &str) -> Result<i64, GatewayError> {
    let secs = finite_number(value, field)?;
    if (0..=TimeWindow::MAX_TIMESTAMP).contains(&secs) {
        Ok(secs)
    } else {
        Err(GatewayError::BadRequest(format!("{} must be a unix timestamp in seconds", field)))
    }
}

/// Cutoff strictly before end, both inside the timestamp range.
pub fn check_window(end_time: i64, cutoff_time: i64) -> Result<(), GatewayError> {
    if cutoff_time <= 0 || end_time <= cutoff_time || end_time > TimeWindow::MAX_TIMESTAMP {
        return Err(GatewayError::BadRequest("cutoffTime must be positive and before endTime".to_string()));
    }
    Ok(())
}

/// Render an external record id (number or string) as text.
pub fn record_id(value: &Value) -> Result<String, GatewayError> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(GatewayError::BadRequest("pickId must be a plain identifier".to_string()));
    }
    Ok(id)
}

/// Merge request fields with configured defaults. `window` supplies the
/// end/cutoff times when the request does not.
pub fn resolve_params(
    request: &DeployRequest,
    defaults: &ToolkitConfig,
    window: TimeWindow,
) -> Result<DeployParams, GatewayError> {
    let name_prefix = request
        .name_prefix
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&defaults.default_name_prefix)
        .to_string();
    if name_prefix.chars().count() > MAX_NAME_PREFIX_CHARS || name_prefix.chars().any(char::is_control) {
        return Err(GatewayError::BadRequest("namePrefix is too long or contains control characters".to_string()));
    }

    let fee_bps = match &request.fee_bps {
        Some(value) => {
            let fee = finite_number(value, "feeBps")?;
            u32::try_from(fee)
                .ok()
                .filter(|fee| *fee <= MAX_FEE_BPS)
                .ok_or_else(|| GatewayError::BadRequest(format!("feeBps must be between 0 and {}", MAX_FEE_BPS)))?
        },
        None => defaults.default_fee_bps,
    };

    let asset = match request.asset.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(normalize_address(raw)?.to_string()),
        None => None,
    };

    let end_time = match &request.end_time {
        Some(value) => timestamp(value, "endTime")?,
        None => window.end_time,
    };
    let cutoff_time = match &request.cutoff_time {
        Some(value) => timestamp(value, "cutoffTime")?,
        // An explicit end without cutoff keeps the standard 30 minute gap.
        None if request.end_time.is_some() => end_time.saturating_sub(TimeWindow::CUTOFF_GAP_SECS),
        None => window.cutoff_time,
    };
    check_window(end_time, cutoff_time)?;

    let pick_id = request.pick_id.as_ref().map(record_id).transpose()?;

    Ok(DeployParams {
        name_prefix,
        fee_bps,
        asset,
        end_time,
        cutoff_time,
        pick_id,
    })
}

/// Environment overrides for `deploy-market`.
pub fn deploy_env(params: &DeployParams) -> ToolkitEnv {
    let mut env = ToolkitEnv::new();
    env.insert("NAME_PREFIX".to_string(), params.name_prefix.clone());
    env.insert("FEE_BPS".to_string(), params.fee_bps.to_string());
    env.insert("END_TIME".to_string(), params.end_time.to_string());
    env.insert("CUTOFF_TIME".to_string(), params.cutoff_time.to_string());
    if let Some(asset) = &params.asset {
        env.insert("ESCROW_ASSET".to_string(), asset.clone());
    }
    if let Some(pick_id) = &params.pick_id {
        env.insert("PICK_ID".to_string(), pick_id.clone());
    }
    env
}

/// Environment overrides for `resolve-market`.
pub fn resolve_env(market: &Address, outcome: &str) -> Result<ToolkitEnv, GatewayError> {
    let outcome = outcome.trim().to_lowercase();
    if !RESOLVE_OUTCOMES.contains(&outcome.as_str()) {
        return Err(GatewayError::BadRequest(format!(
            "result must be one of: {}",
            RESOLVE_OUTCOMES.join(", ")
        )));
    }

    let mut env = ToolkitEnv::new();
    env.insert("MARKET_ADDRESS".to_string(), market.to_string());
    env.insert("RESOLVE_RESULT".to_string(), outcome);
    Ok(env)
}

/// Environment overrides for `claim-market`.
pub fn claim_env(market: &Address, wallet: &Address) -> ToolkitEnv {
    let mut env = ToolkitEnv::new();
    env.insert("MARKET_ADDRESS".to_string(), market.to_string());
    env.insert("CLAIM_WALLET".to_string(), wallet.to_string());
    env
}

/// Environment overrides for `manual-refund`.
pub fn refund_env(market: &Address, wallet: &Address, direct: bool) -> ToolkitEnv {
    let mut env = claim_env(market, wallet);
    env.insert("REFUND_DIRECT".to_string(), direct.to_string());
    env
}
