//! Exchange-agnostic traits used by the rest of the workspace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use torii_core::{
    Balance, BoardState, Collateral, CollateralHistoryEntry, Order, OrderState, Position,
};

/// Convenience alias for gateway results.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Common error type shared by the connector, the books and the runtime.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A Realtime event payload was malformed or missing required fields.
    /// Fatal to that event's processing only.
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Transport-level failures (network, timeouts, closed sockets).
    #[error("transport error: {0}")]
    Transport(String),
    /// Authentication failed or credentials are missing.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Serialization or parsing errors.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The exchange responded with a business error.
    #[error("exchange error: {0}")]
    Exchange(String),
    /// A catch-all branch for other issues.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Helper used when mapping any displayable error into a gateway error.
    pub fn from_display(err: impl std::fmt::Display, kind: GatewayErrorKind) -> Self {
        match kind {
            GatewayErrorKind::Transaction => Self::Transaction(err.to_string()),
            GatewayErrorKind::Transport => Self::Transport(err.to_string()),
            GatewayErrorKind::Authentication => Self::Authentication(err.to_string()),
            GatewayErrorKind::Serialization => Self::Serialization(err.to_string()),
            GatewayErrorKind::Exchange => Self::Exchange(err.to_string()),
            GatewayErrorKind::Other => Self::Other(err.to_string()),
        }
    }
}

/// Enumerates the broad families of gateway errors.
#[derive(Debug, Clone, Copy)]
pub enum GatewayErrorKind {
    Transaction,
    Transport,
    Authentication,
    Serialization,
    Exchange,
    Other,
}

/// The synchronous request/response surface the core consumes from the
/// exchange's REST API.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Current health/state signal for a product's board.
    async fn board_state(&self, product_code: &str) -> GatewayResult<BoardState>;

    /// Child orders filtered by state.
    async fn child_orders(&self, product_code: &str, state: OrderState)
        -> GatewayResult<Vec<Order>>;

    /// Account balances per currency.
    async fn balances(&self) -> GatewayResult<Vec<Balance>>;

    /// Margin collateral summary.
    async fn collateral(&self) -> GatewayResult<Collateral>;

    /// Open positions for a product.
    async fn positions(&self, product_code: &str) -> GatewayResult<Vec<Position>>;

    /// Collateral change history, newest first, optionally after a cursor id.
    async fn collateral_history(
        &self,
        after: Option<i64>,
        count: Option<u32>,
    ) -> GatewayResult<Vec<CollateralHistoryEntry>>;
}

/// Fire-and-forget delivery of plain-text reports to a human.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> GatewayResult<()>;
}

/// Routes an inbound `(payload, channel)` pair to interested handlers.
///
/// Implemented by the runtime's dispatcher; consumed by the stream so the
/// connector does not depend on the runtime crate.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, payload: &serde_json::Value, channel: &str) -> GatewayResult<()>;
}

/// A cloneable pause/resume flag observed by a long-running loop.
///
/// Pausing is a local processing gate only: the owning loop keeps its
/// connection open and simply stops consuming until resumed.
#[derive(Clone)]
pub struct PauseSwitch {
    label: &'static str,
    paused: Arc<AtomicBool>,
}

impl PauseSwitch {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("the {} is paused", self.label);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("the {} is resumed", self.label);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_switch_round_trip() {
        let switch = PauseSwitch::new("stream");
        assert!(!switch.is_paused());
        switch.pause();
        assert!(switch.is_paused());
        let clone = switch.clone();
        clone.resume();
        assert!(!switch.is_paused());
    }

    #[test]
    fn error_family_prefixes_display_text() {
        let err = GatewayError::Transaction("missing price".into());
        assert_eq!(err.to_string(), "transaction error: missing price");
        let err = GatewayError::from_display("boom", GatewayErrorKind::Exchange);
        assert_eq!(err.to_string(), "exchange error: boom");
    }
}
