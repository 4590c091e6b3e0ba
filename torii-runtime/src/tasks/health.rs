use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use torii_broker::{ExchangeApi, GatewayResult, PauseSwitch};

use crate::BatchTask;

const INTERVAL_SECS: u64 = 60;

/// Gates the stream on the exchange's board health signal.
///
/// This is the only component that pauses or resumes the stream: it pauses
/// consumption while the board is degraded or halted and resumes it once the
/// board reports NORMAL/RUNNING again.
pub struct HealthCheckTask {
    exchange: Arc<dyn ExchangeApi>,
    stream: PauseSwitch,
    product_code: String,
}

impl HealthCheckTask {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        stream: PauseSwitch,
        product_code: impl Into<String>,
    ) -> Self {
        Self {
            exchange,
            stream,
            product_code: product_code.into(),
        }
    }
}

#[async_trait]
impl BatchTask for HealthCheckTask {
    fn name(&self) -> &str {
        "health-check"
    }

    fn interval(&self) -> u64 {
        INTERVAL_SECS
    }

    async fn run(&self) -> GatewayResult<()> {
        debug!("performing health check");
        let board = self.exchange.board_state(&self.product_code).await?;

        if self.stream.is_paused() && board.is_operational() {
            self.stream.resume();
        } else if !self.stream.is_paused() && !board.is_operational() {
            self.stream.pause();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torii_core::{BoardState, MarketHealth, MarketState};
    use torii_test_utils::StubExchange;

    fn board(health: MarketHealth, state: MarketState) -> BoardState {
        BoardState { health, state }
    }

    fn task(exchange: Arc<StubExchange>) -> (HealthCheckTask, PauseSwitch) {
        let switch = PauseSwitch::new("stream");
        let task = HealthCheckTask::new(exchange, switch.clone(), "FX_BTC_JPY");
        (task, switch)
    }

    #[tokio::test]
    async fn pauses_a_running_stream_when_the_board_degrades() {
        let exchange = Arc::new(StubExchange::new().with_board_state(board(
            MarketHealth::SuperBusy,
            MarketState::Running,
        )));
        let (task, switch) = task(exchange);
        task.run().await.expect("health check succeeds");
        assert!(switch.is_paused());
    }

    #[tokio::test]
    async fn pauses_when_the_board_is_not_running() {
        let exchange = Arc::new(StubExchange::new().with_board_state(board(
            MarketHealth::Normal,
            MarketState::CircuitBreak,
        )));
        let (task, switch) = task(exchange);
        task.run().await.expect("health check succeeds");
        assert!(switch.is_paused());
    }

    #[tokio::test]
    async fn resumes_a_paused_stream_once_the_board_recovers() {
        let exchange = Arc::new(StubExchange::new().with_board_state(board(
            MarketHealth::Normal,
            MarketState::Running,
        )));
        let (task, switch) = task(exchange);
        switch.pause();
        task.run().await.expect("health check succeeds");
        assert!(!switch.is_paused());
    }

    #[tokio::test]
    async fn leaves_state_unchanged_otherwise() {
        // Healthy board, stream already running.
        let exchange = Arc::new(StubExchange::new());
        let (task, switch) = task(exchange.clone());
        task.run().await.expect("health check succeeds");
        assert!(!switch.is_paused());

        // Degraded board, stream already paused.
        exchange.set_board_state(board(MarketHealth::Stop, MarketState::Closed));
        switch.pause();
        task.run().await.expect("health check succeeds");
        assert!(switch.is_paused());
        assert_eq!(exchange.board_state_calls(), 2);
    }
}
