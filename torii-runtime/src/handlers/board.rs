use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use torii_agent::Agent;
use torii_books::DataStore;
use torii_broker::GatewayResult;
use torii_core::channels;

use crate::MessageHandler;

/// Buffers board snapshots and consults the agent once the window is full.
pub struct BoardEventHandler {
    channel_names: Vec<String>,
    data_store: Arc<DataStore>,
    agent: Arc<dyn Agent>,
}

impl BoardEventHandler {
    pub fn new(data_store: Arc<DataStore>, agent: Arc<dyn Agent>, product_code: &str) -> Self {
        Self {
            channel_names: vec![channels::board_snapshot(product_code)],
            data_store,
            agent,
        }
    }
}

#[async_trait]
impl MessageHandler for BoardEventHandler {
    fn name(&self) -> &str {
        "board-event"
    }

    fn channels(&self) -> &[String] {
        &self.channel_names
    }

    async fn handle(&self, payload: &Value, _channel: &str) -> GatewayResult<()> {
        self.data_store.append(payload.clone()).await;
        if self.data_store.is_full().await {
            let window = self.data_store.snapshot().await;
            let action = self.agent.decide(&window).await;
            self.agent.act(action).await;
        }
        Ok(())
    }
}
