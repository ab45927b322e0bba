// common/src/models/deployment.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-request datastore credentials. Honored only as a complete url/key
/// pair, which then replaces the configured datastore.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatastoreOverride {
    pub url: Option<String>,
    pub key: Option<String>,
}

/// Body of the deploy endpoints. Numeric fields arrive as JSON numbers or
/// numeric strings and are validated before they reach the toolkit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub name_prefix: Option<String>,
    pub fee_bps: Option<Value>,
    pub asset: Option<String>,
    pub end_time: Option<Value>,
    pub cutoff_time: Option<Value>,
    /// External record id (a "pick") the market is deployed for
    pub pick_id: Option<Value>,
    pub datastore: Option<DatastoreOverride>,
}

/// Fully resolved deployment parameters, as injected into the toolkit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployParams {
    pub name_prefix: String,
    pub fee_bps: u32,
    pub asset: Option<String>,
    pub end_time: i64,
    pub cutoff_time: i64,
    pub pick_id: Option<String>,
}

/// Addresses reported by a successful deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedMarket {
    pub market_address: String,
    pub yes_share_address: Option<String>,
    pub no_share_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbUpdate {
    Ok,
    Skipped,
    Failed,
}

/// Outcome of the datastore write following a deployment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub db_update: DbUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

/// Response of the deploy endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub success: bool,
    #[serde(flatten)]
    pub market: DeployedMarket,
    pub fee_bps: u32,
    pub end_time: i64,
    pub cutoff_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pick_id: Option<String>,
    #[serde(flatten)]
    pub reconcile: ReconcileOutcome,
}

/// Body of `POST /api/resolve-market`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub market_address: String,
    pub result: String,
}

/// Body of `POST /api/claim-market`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub market_address: String,
    /// Defaults to the authenticated wallet
    pub wallet: Option<String>,
}

/// Body of `POST /api/refund-market`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub market_address: String,
    /// Defaults to the authenticated wallet
    pub wallet: Option<String>,
    /// Pay straight from the deployer wallet instead of `claimFor`
    #[serde(default)]
    pub direct: bool,
}

/// Body of `POST /api/reconcile-market`: retry of the datastore write alone
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub pick_id: Value,
    #[serde(flatten)]
    pub market: DeployedMarket,
    pub fee_bps: u32,
    pub end_time: i64,
    pub cutoff_time: i64,
    pub datastore: Option<DatastoreOverride>,
}
