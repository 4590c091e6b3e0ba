use std::sync::Arc;

use tokio::sync::Mutex;

use torii_broker::{ExchangeApi, GatewayResult};
use torii_core::{Position, Price, Side, Size};

/// Local view of the account's open positions, in insertion order.
///
/// Insertion order doubles as the offsetting order: the earliest-opened
/// opposite position is consumed first when a fill arrives.
pub struct PositionBook {
    exchange: Arc<dyn ExchangeApi>,
    product_code: String,
    positions: Mutex<Vec<Position>>,
}

impl PositionBook {
    pub fn new(exchange: Arc<dyn ExchangeApi>, product_code: impl Into<String>) -> Self {
        Self {
            exchange,
            product_code: product_code.into(),
            positions: Mutex::new(Vec::new()),
        }
    }

    /// Replace the local view with the exchange's open positions.
    pub async fn sync(&self) -> GatewayResult<()> {
        let mut positions = self.positions.lock().await;
        *positions = self.exchange.positions(&self.product_code).await?;
        Ok(())
    }

    /// Apply a fill to the book, offsetting opposite positions FIFO.
    ///
    /// Each opposite position absorbs as much of the incoming size as it can;
    /// fully consumed positions are removed, a partially consumed one shrinks
    /// and stops the scan. Whatever size survives the sweep is appended as a
    /// new open position. Returns the PnL realized across all offsets.
    pub async fn add_and_settle(&self, incoming: Position) -> Price {
        let mut positions = self.positions.lock().await;
        let mut incoming = incoming;
        let mut pnl = 0.0;

        let mut idx = 0;
        while idx < positions.len() {
            if positions[idx].side == incoming.side {
                idx += 1;
                continue;
            }
            let existing = &mut positions[idx];
            if existing.size > incoming.size {
                pnl += offset_pnl(incoming.side, incoming.price, existing.price, incoming.size);
                existing.size -= incoming.size;
                return pnl;
            } else if existing.size == incoming.size {
                pnl += offset_pnl(incoming.side, incoming.price, existing.price, incoming.size);
                positions.remove(idx);
                return pnl;
            } else {
                pnl += offset_pnl(incoming.side, incoming.price, existing.price, existing.size);
                incoming.size -= existing.size;
                positions.remove(idx);
            }
        }

        positions.push(incoming);
        pnl
    }

    /// Defensive copy of the current positions.
    pub async fn positions(&self) -> Vec<Position> {
        self.positions.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.positions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.positions.lock().await.is_empty()
    }
}

/// Realized PnL for offsetting `size` of an existing position against an
/// incoming fill. A SELL closing a BUY earns the price increase; a BUY
/// closing a SELL earns the price decrease.
fn offset_pnl(incoming_side: Side, incoming_price: Price, existing_price: Price, size: Size) -> Price {
    match incoming_side {
        Side::Sell => (incoming_price - existing_price) * size,
        Side::Buy => (existing_price - incoming_price) * size,
    }
}
