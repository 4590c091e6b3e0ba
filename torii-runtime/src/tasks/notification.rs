use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::Mutex;
use tracing::info;

use torii_books::OrderBook;
use torii_broker::{ExchangeApi, GatewayResult, Notifier};

use crate::BatchTask;

const INTERVAL_SECS: u64 = 600;

/// Periodically reports recent orders and realized PnL through the notifier.
///
/// Realized PnL is derived from the exchange's collateral change history; the
/// per-task cursor remembers the newest entry already reported and is seeded
/// at construction so the first report only covers changes after startup.
pub struct NotificationTask {
    notifier: Arc<dyn Notifier>,
    exchange: Arc<dyn ExchangeApi>,
    order_book: Arc<OrderBook>,
    legal_currency_code: String,
    last_history_id: Mutex<Option<i64>>,
}

impl NotificationTask {
    pub async fn new(
        notifier: Arc<dyn Notifier>,
        exchange: Arc<dyn ExchangeApi>,
        order_book: Arc<OrderBook>,
        legal_currency_code: impl Into<String>,
    ) -> GatewayResult<Self> {
        let last_history_id = exchange
            .collateral_history(None, Some(1))
            .await?
            .first()
            .map(|entry| entry.id);
        Ok(Self {
            notifier,
            exchange,
            order_book,
            legal_currency_code: legal_currency_code.into(),
            last_history_id: Mutex::new(last_history_id),
        })
    }
}

#[async_trait]
impl BatchTask for NotificationTask {
    fn name(&self) -> &str {
        "notification"
    }

    fn interval(&self) -> u64 {
        INTERVAL_SECS
    }

    async fn run(&self) -> GatewayResult<()> {
        info!("sending notification");

        let mut cursor = self.last_history_id.lock().await;
        let history = self.exchange.collateral_history(*cursor, None).await?;
        let pnl: f64 = history
            .iter()
            .filter(|entry| entry.currency_code == self.legal_currency_code)
            .map(|entry| entry.change)
            .sum();
        if let Some(newest) = history.first() {
            *cursor = Some(newest.id);
        }
        drop(cursor);

        let orders = self.order_book.orders().await;
        self.order_book.flush().await;

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut message = format!("Report Order History (~{now})\n\n");
        message.push_str(&format!("PnL: {pnl} {}\n\n", self.legal_currency_code));
        for order in &orders {
            message.push_str(&format!(
                "- ID: {}, State: {}, Side: {}, Price: {}, Size: {}\n",
                order.acceptance_id,
                order.state.as_str(),
                order.side.as_str(),
                order.price,
                order.size
            ));
        }
        if orders.is_empty() {
            message.push_str("No new orders.");
        }

        self.notifier.notify(&message).await
    }
}
