use std::sync::Arc;

use tokio::sync::Mutex;

use torii_broker::{ExchangeApi, GatewayResult};
use torii_core::{Order, OrderState};

/// Local view of the account's child orders, keyed by acceptance id.
pub struct OrderBook {
    exchange: Arc<dyn ExchangeApi>,
    product_code: String,
    orders: Mutex<Vec<Order>>,
}

impl OrderBook {
    pub fn new(exchange: Arc<dyn ExchangeApi>, product_code: impl Into<String>) -> Self {
        Self {
            exchange,
            product_code: product_code.into(),
            orders: Mutex::new(Vec::new()),
        }
    }

    /// Replace the local view with the exchange's ACTIVE orders.
    pub async fn sync(&self) -> GatewayResult<()> {
        let mut orders = self.orders.lock().await;
        *orders = self
            .exchange
            .child_orders(&self.product_code, OrderState::Active)
            .await?;
        Ok(())
    }

    /// Append a newly accepted order.
    pub async fn add(&self, order: Order) {
        self.orders.lock().await.push(order);
    }

    /// Mark the ACTIVE order with this acceptance id COMPLETED.
    ///
    /// Returns the updated order, or `None` when no ACTIVE order matches.
    pub async fn complete(&self, acceptance_id: &str) -> Option<Order> {
        self.transition(acceptance_id, OrderState::Completed).await
    }

    /// Mark the ACTIVE order with this acceptance id CANCELED.
    pub async fn cancel(&self, acceptance_id: &str) -> Option<Order> {
        self.transition(acceptance_id, OrderState::Canceled).await
    }

    async fn transition(&self, acceptance_id: &str, to: OrderState) -> Option<Order> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|o| o.acceptance_id == acceptance_id && o.state == OrderState::Active)?;
        order.state = to;
        Some(order.clone())
    }

    /// Defensive copy of the current orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.lock().await.clone()
    }

    /// Discard terminal orders, retaining only ACTIVE ones.
    pub async fn flush(&self) {
        self.orders
            .lock()
            .await
            .retain(|o| o.state == OrderState::Active);
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }
}
