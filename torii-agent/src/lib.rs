//! Decision agent seam: a pluggable strategy that receives a window of raw
//! market-data snapshots and answers with a discrete action.

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tracing::info;

/// A raw market-data snapshot as received from the stream.
pub type Observation = Value;

/// The discrete actions an agent can take.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

/// Capability interface for decision agents.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-friendly identifier used in logs.
    fn name(&self) -> &str;

    /// Choose an action based on the buffered observation window.
    async fn decide(&self, window: &[Observation]) -> Action;

    /// Execute the chosen action.
    async fn act(&self, action: Action);
}

/// Placeholder agent that picks uniformly at random and only logs its moves.
pub struct RandomAgent {
    product_code: String,
}

impl RandomAgent {
    pub fn new(product_code: impl Into<String>) -> Self {
        Self {
            product_code: product_code.into(),
        }
    }
}

#[async_trait]
impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    async fn decide(&self, _window: &[Observation]) -> Action {
        match rand::thread_rng().gen_range(0..3) {
            0 => Action::Hold,
            1 => Action::Buy,
            _ => Action::Sell,
        }
    }

    async fn act(&self, action: Action) {
        match action {
            Action::Hold => info!(product = %self.product_code, "doing nothing"),
            Action::Buy => info!(product = %self.product_code, "executing buy action"),
            Action::Sell => info!(product = %self.product_code, "executing sell action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn random_agent_covers_every_action() {
        let agent = RandomAgent::new("FX_BTC_JPY");
        let mut seen = [false; 3];
        for _ in 0..200 {
            match agent.decide(&[]).await {
                Action::Hold => seen[0] = true,
                Action::Buy => seen[1] = true,
                Action::Sell => seen[2] = true,
            }
        }
        assert!(seen.iter().all(|s| *s));
        agent.act(Action::Buy).await;
    }
}
