use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use torii_books::{OrderBook, Portfolio, PositionBook};
use torii_broker::{GatewayError, GatewayResult};
use torii_core::{channels, Order, OrderType, Position, Price, Side, Size};

use crate::MessageHandler;

/// One sub-event of a `child_order_events` payload. Every field is optional
/// on the wire; each event kind validates its own requirements before any
/// book is touched. Unrecognized event kinds are skipped, so the tag stays a
/// plain string.
#[derive(Debug, Deserialize)]
struct ChildOrderEvent {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    product_code: Option<String>,
    #[serde(default)]
    child_order_id: Option<String>,
    #[serde(default)]
    child_order_acceptance_id: Option<String>,
    #[serde(default)]
    child_order_type: Option<OrderType>,
    #[serde(default)]
    expire_date: Option<NaiveDateTime>,
    #[serde(default)]
    side: Option<Side>,
    #[serde(default)]
    price: Option<Price>,
    #[serde(default)]
    size: Option<Size>,
}

/// Applies child order lifecycle events to the books.
pub struct ChildOrderEventHandler {
    channel_names: Vec<String>,
    order_book: Arc<OrderBook>,
    position_book: Arc<PositionBook>,
    portfolio: Arc<Portfolio>,
    product_code: String,
}

impl ChildOrderEventHandler {
    pub fn new(
        order_book: Arc<OrderBook>,
        position_book: Arc<PositionBook>,
        portfolio: Arc<Portfolio>,
        product_code: impl Into<String>,
    ) -> Self {
        Self {
            channel_names: vec![channels::CHILD_ORDER_EVENTS.to_string()],
            order_book,
            position_book,
            portfolio,
            product_code: product_code.into(),
        }
    }

    async fn on_order(&self, event: ChildOrderEvent) -> GatewayResult<()> {
        let (
            Some(product_code),
            Some(order_id),
            Some(acceptance_id),
            Some(order_type),
            Some(expire_date),
            Some(side),
            Some(price),
            Some(size),
        ) = (
            event.product_code,
            event.child_order_id,
            event.child_order_acceptance_id,
            event.child_order_type,
            event.expire_date,
            event.side,
            event.price,
            event.size,
        )
        else {
            return Err(GatewayError::Transaction(
                "invalid order event data received, missing one of: product_code, \
                 child_order_id, child_order_acceptance_id, child_order_type, expire_date, \
                 side, price, size"
                    .into(),
            ));
        };

        let mut order = Order::accepted(
            product_code,
            side,
            order_type,
            price,
            size,
            acceptance_id.clone(),
        );
        order.order_id = Some(order_id);
        order.expire_date = Some(expire_date);

        tokio::try_join!(
            async {
                self.order_book.add(order).await;
                Ok::<_, GatewayError>(())
            },
            self.portfolio.sync(),
        )?;

        info!(
            order_id = %acceptance_id,
            side = side.as_str(),
            price,
            size,
            "order event received"
        );
        Ok(())
    }

    async fn on_execution(&self, event: ChildOrderEvent) -> GatewayResult<()> {
        let (Some(acceptance_id), Some(side), Some(price), Some(size)) = (
            event.child_order_acceptance_id,
            event.side,
            event.price,
            event.size,
        ) else {
            return Err(GatewayError::Transaction(
                "invalid execution event data received, missing one of: \
                 child_order_acceptance_id, side, price, size"
                    .into(),
            ));
        };

        let (_completed, pnl, ()) = tokio::try_join!(
            async {
                Ok::<_, GatewayError>(self.order_book.complete(&acceptance_id).await)
            },
            async {
                let fill = Position::opened(self.product_code.clone(), side, price, size);
                Ok::<_, GatewayError>(self.position_book.add_and_settle(fill).await)
            },
            self.portfolio.sync(),
        )?;

        info!(order_id = %acceptance_id, pnl, "execution event received");
        Ok(())
    }

    async fn on_cancel(&self, event: ChildOrderEvent) -> GatewayResult<()> {
        let Some(acceptance_id) = event.child_order_acceptance_id else {
            return Err(GatewayError::Transaction(
                "invalid cancel event data received, missing child_order_acceptance_id".into(),
            ));
        };

        self.order_book.cancel(&acceptance_id).await;
        info!(order_id = %acceptance_id, "cancel event received");
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ChildOrderEventHandler {
    fn name(&self) -> &str {
        "child-order-event"
    }

    fn channels(&self) -> &[String] {
        &self.channel_names
    }

    async fn handle(&self, payload: &Value, _channel: &str) -> GatewayResult<()> {
        let events: Vec<ChildOrderEvent> = serde_json::from_value(payload.clone())
            .map_err(|err| {
                GatewayError::Transaction(format!("malformed child order event payload: {err}"))
            })?;

        for event in events {
            let kind = event.event_type.clone();
            match kind.as_deref() {
                Some("ORDER") => self.on_order(event).await?,
                Some("EXECUTION") => self.on_execution(event).await?,
                Some("CANCEL") => self.on_cancel(event).await?,
                Some("ORDER_FAILED") => {
                    info!(
                        order_id = ?event.child_order_acceptance_id,
                        "order failed event received"
                    );
                }
                Some("CANCEL_FAILED") => {
                    info!(
                        order_id = ?event.child_order_acceptance_id,
                        "cancel failed event received"
                    );
                }
                _ => {}
            }
        }
        Ok(())
    }
}
