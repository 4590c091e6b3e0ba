//! bitFlyer Lightning REST connector.
//!
//! Private endpoints sign `timestamp + method + path + body` with HMAC-SHA256
//! over the API secret and send the `ACCESS-KEY` / `ACCESS-TIMESTAMP` /
//! `ACCESS-SIGN` headers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use torii_broker::{ExchangeApi, GatewayError, GatewayResult};
use torii_core::{
    Balance, BoardState, Collateral, CollateralHistoryEntry, Order, OrderState, Position,
};

pub mod ws;

pub use ws::LightningStream;

type HmacSha256 = Hmac<Sha256>;

/// API credentials required for private endpoints and the stream auth frame.
#[derive(Clone, Debug)]
pub struct LightningCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Configuration for the Lightning REST client.
pub struct LightningConfig {
    pub base_url: String,
}

impl Default for LightningConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitflyer.com".into(),
        }
    }
}

/// A thin wrapper over the Lightning v1 REST API.
pub struct LightningClient {
    http: Client,
    config: LightningConfig,
    credentials: Option<LightningCredentials>,
}

impl LightningClient {
    /// Build a new client optionally configured with credentials.
    pub fn new(config: LightningConfig, credentials: Option<LightningCredentials>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create reqwest client");
        Self {
            http,
            config,
            credentials,
        }
    }

    fn creds(&self) -> GatewayResult<&LightningCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| GatewayError::Authentication("missing Lightning credentials".into()))
    }

    fn url(&self, request_path: &str) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            request_path
        )
    }

    async fn public_get<T>(&self, path: &str, query: &[(&str, String)]) -> GatewayResult<T>
    where
        T: DeserializeOwned,
    {
        let request_path = request_path(path, query);
        let resp = self
            .http
            .get(self.url(&request_path))
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        decode(resp).await
    }

    async fn private_get<T>(&self, path: &str, query: &[(&str, String)]) -> GatewayResult<T>
    where
        T: DeserializeOwned,
    {
        let creds = self.creds()?;
        let request_path = request_path(path, query);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let payload = format!("{timestamp}GET{request_path}");
        let signature = sign(&creds.api_secret, &payload)?;
        let resp = self
            .http
            .get(self.url(&request_path))
            .header("ACCESS-KEY", &creds.api_key)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-SIGN", signature)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        decode(resp).await
    }
}

#[async_trait]
impl ExchangeApi for LightningClient {
    async fn board_state(&self, product_code: &str) -> GatewayResult<BoardState> {
        self.public_get(
            "/v1/getboardstate",
            &[("product_code", product_code.to_string())],
        )
        .await
    }

    async fn child_orders(
        &self,
        product_code: &str,
        state: OrderState,
    ) -> GatewayResult<Vec<Order>> {
        self.private_get(
            "/v1/me/getchildorders",
            &[
                ("product_code", product_code.to_string()),
                ("child_order_state", state.as_str().to_string()),
            ],
        )
        .await
    }

    async fn balances(&self) -> GatewayResult<Vec<Balance>> {
        self.private_get("/v1/me/getbalance", &[]).await
    }

    async fn collateral(&self) -> GatewayResult<Collateral> {
        self.private_get("/v1/me/getcollateral", &[]).await
    }

    async fn positions(&self, product_code: &str) -> GatewayResult<Vec<Position>> {
        self.private_get(
            "/v1/me/getpositions",
            &[("product_code", product_code.to_string())],
        )
        .await
    }

    async fn collateral_history(
        &self,
        after: Option<i64>,
        count: Option<u32>,
    ) -> GatewayResult<Vec<CollateralHistoryEntry>> {
        let mut query = Vec::new();
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }
        if let Some(count) = count {
            query.push(("count", count.to_string()));
        }
        self.private_get("/v1/me/getcollateralhistory", &query).await
    }
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed by `secret`.
pub(crate) fn sign(secret: &str, payload: &str) -> GatewayResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| GatewayError::Other(format!("failed to create signing key: {err}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn request_path(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let joined = query
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{joined}")
}

async fn decode<T>(resp: reqwest::Response) -> GatewayResult<T>
where
    T: DeserializeOwned,
{
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Exchange(format!("{status}: {body}")));
    }
    resp.json::<T>()
        .await
        .map_err(|err| GatewayError::Serialization(err.to_string()))
}
