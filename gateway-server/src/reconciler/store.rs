// gateway-server/src/reconciler/store.rs
//! The external datastore holding pick records (PostgREST / Supabase API).
use async_trait::async_trait;
use common::models::deployment::DeployedMarket;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use super::window::PickTiming;

/// Where and as whom to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreCredentials {
    pub url: String,
    pub key: String,
}

/// Columns written after a successful deployment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketUpdate {
    pub market_address: String,
    pub yes_share_address: Option<String>,
    pub no_share_address: Option<String>,
    pub fee_bps: u32,
    pub end_time: i64,
    pub cutoff_time: i64,
    pub market_status: &'static str,
}

impl MarketUpdate {
    pub fn deployed(market: &DeployedMarket, fee_bps: u32, end_time: i64, cutoff_time: i64) -> Self {
        Self {
            market_address: market.market_address.clone(),
            yes_share_address: market.yes_share_address.clone(),
            no_share_address: market.no_share_address.clone(),
            fee_bps,
            end_time,
            cutoff_time,
            market_status: "deployed",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid datastore url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid datastore key")]
    InvalidKey,
    #[error("datastore request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("datastore returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("record {0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Timing fields of a pick, `None` if no such record.
    async fn fetch_timing(
        &self,
        creds: &DatastoreCredentials,
        record_id: &str,
    ) -> Result<Option<PickTiming>, StoreError>;

    /// Write deployment results onto a pick. Same input, same row state.
    async fn record_deployment(
        &self,
        creds: &DatastoreCredentials,
        record_id: &str,
        update: &MarketUpdate,
    ) -> Result<(), StoreError>;
}

/// Longest error body kept from the datastore
const MAX_ERROR_BODY: usize = 500;

pub struct RestMarketStore {
    client: reqwest::Client,
    table: String,
}

impl RestMarketStore {
    pub fn new(table: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            table: table.into(),
        })
    }

    /// `{base}/rest/v1/{table}?id=eq.{record_id}`
    pub fn record_url(&self, base: &str, record_id: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", base.trim_end_matches('/'), self.table))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", record_id));
        Ok(url)
    }

    fn headers(creds: &DatastoreCredentials) -> Result<HeaderMap, StoreError> {
        let key = HeaderValue::from_str(&creds.key).map_err(|_| StoreError::InvalidKey)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", creds.key)).map_err(|_| StoreError::InvalidKey)?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }
}

#[async_trait]
impl MarketStore for RestMarketStore {
    async fn fetch_timing(
        &self,
        creds: &DatastoreCredentials,
        record_id: &str,
    ) -> Result<Option<PickTiming>, StoreError> {
        let mut url = self.record_url(&creds.url, record_id)?;
        url.query_pairs_mut().append_pair("select", "expires_at,duration_hours");

        let response = self
            .client
            .get(url)
            .headers(Self::headers(creds)?)
            .send()
            .await?;
        let rows: Vec<PickTiming> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn record_deployment(
        &self,
        creds: &DatastoreCredentials,
        record_id: &str,
        update: &MarketUpdate,
    ) -> Result<(), StoreError> {
        let url = self.record_url(&creds.url, record_id)?;

        let response = self
            .client
            .patch(url)
            .headers(Self::headers(creds)?)
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::check(response).await?.json().await?;

        // PATCH matching zero rows still answers 200
        if rows.is_empty() {
            return Err(StoreError::NotFound(record_id.to_string()));
        }
        Ok(())
    }
}
