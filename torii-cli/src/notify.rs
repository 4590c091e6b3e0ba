use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use torii_broker::{GatewayError, GatewayResult, Notifier};
use torii_config::NotifierConfig;

/// Delivers reports through the LINE Messaging API push endpoint.
pub struct LineNotifier {
    http: Client,
    base_url: String,
    channel_token: String,
    destination_user_id: String,
}

impl LineNotifier {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            http: Client::builder().build().expect("failed to create reqwest client"),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            channel_token: config.channel_token.clone(),
            destination_user_id: config.destination_user_id.clone(),
        }
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn notify(&self, text: &str) -> GatewayResult<()> {
        let payload = json!({
            "to": self.destination_user_id,
            "messages": [{ "type": "text", "text": text }],
        });
        let resp = self
            .http
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(&self.channel_token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Other(format!(
                "notification rejected: {status}: {body}"
            )));
        }
        debug!("notification delivered");
        Ok(())
    }
}
