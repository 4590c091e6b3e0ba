//! Fundamental data types shared across the entire workspace.
//!
//! Struct fields carry the exchange's wire names through serde renames so the
//! REST and Realtime payloads deserialize straight into the domain model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Alias for price precision. The exchange quotes plain JSON numbers.
pub type Price = f64;
/// Alias for order and position sizes.
pub type Size = f64;
/// Alias used for product identifiers (e.g., `FX_BTC_JPY`).
pub type ProductCode = String;

/// The side of an order or position.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side (buy <-> sell).
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire representation used by the exchange.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order execution style.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force constraints accepted by the exchange.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

/// Lifecycle state of a child order. Terminal states never revert.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderState {
    #[default]
    Active,
    Completed,
    Canceled,
    Expired,
    Rejected,
}

impl OrderState {
    /// Wire representation, also used in REST query parameters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// A child order as tracked by the order book.
///
/// The acceptance id is the exchange-issued correlation key that ties the
/// order to its later execution and cancel events; at most one order per
/// acceptance id is ACTIVE at a time.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Order {
    pub product_code: ProductCode,
    pub side: Side,
    #[serde(rename = "child_order_type")]
    pub order_type: OrderType,
    pub price: Price,
    pub size: Size,
    #[serde(rename = "child_order_acceptance_id")]
    pub acceptance_id: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "child_order_id", default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub average_price: Option<Price>,
    #[serde(rename = "child_order_state", default)]
    pub state: OrderState,
    #[serde(default)]
    pub expire_date: Option<NaiveDateTime>,
    #[serde(rename = "child_order_date", default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub outstanding_size: Option<Size>,
    #[serde(default)]
    pub cancel_size: Option<Size>,
    #[serde(default)]
    pub executed_size: Option<Size>,
    #[serde(default)]
    pub total_commission: Option<Price>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
}

impl Order {
    /// Build a freshly accepted order carrying only the fields the Realtime
    /// order event provides. Everything else arrives via later syncs.
    #[must_use]
    pub fn accepted(
        product_code: impl Into<ProductCode>,
        side: Side,
        order_type: OrderType,
        price: Price,
        size: Size,
        acceptance_id: impl Into<String>,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            side,
            order_type,
            price,
            size,
            acceptance_id: acceptance_id.into(),
            id: None,
            order_id: None,
            average_price: None,
            state: OrderState::Active,
            expire_date: None,
            created_at: None,
            outstanding_size: None,
            cancel_size: None,
            executed_size: None,
            total_commission: None,
            time_in_force: None,
        }
    }
}

/// An open position held against the exchange.
///
/// Size is strictly positive while held; fully offset positions are removed
/// from the book rather than kept at zero.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Position {
    pub product_code: ProductCode,
    pub side: Side,
    pub price: Price,
    pub size: Size,
    #[serde(default)]
    pub commission: Option<Price>,
    #[serde(default)]
    pub swap_point_accumulate: Option<Price>,
    #[serde(default)]
    pub require_collateral: Option<Price>,
    #[serde(default)]
    pub open_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub pnl: Option<Price>,
    #[serde(default)]
    pub sfd: Option<Price>,
}

impl Position {
    /// Build the minimal just-filled position used when settling executions.
    #[must_use]
    pub fn opened(
        product_code: impl Into<ProductCode>,
        side: Side,
        price: Price,
        size: Size,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            side,
            price,
            size,
            commission: None,
            swap_point_accumulate: None,
            require_collateral: None,
            open_date: None,
            leverage: None,
            pnl: None,
            sfd: None,
        }
    }
}

/// A single currency balance entry.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Balance {
    pub currency_code: String,
    pub amount: f64,
    #[serde(default)]
    pub available: Option<f64>,
}

/// Margin collateral summary.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Collateral {
    pub collateral: f64,
    #[serde(default)]
    pub open_position_pnl: Option<f64>,
    #[serde(default)]
    pub require_collateral: Option<f64>,
    #[serde(default)]
    pub keep_rate: Option<f64>,
}

/// One entry of the collateral change history, newest first.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CollateralHistoryEntry {
    pub id: i64,
    pub currency_code: String,
    pub change: f64,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
}

/// Exchange-reported load level for a product's board.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketHealth {
    Normal,
    Busy,
    VeryBusy,
    SuperBusy,
    NoOrder,
    Stop,
}

/// Exchange-reported operating state for a product's board.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    Running,
    Closed,
    Starting,
    Preopen,
    CircuitBreak,
}

/// Combined health/state signal consumed by the health check task.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BoardState {
    pub health: MarketHealth,
    pub state: MarketState,
}

impl BoardState {
    /// True when the board accepts orders and processes them promptly.
    #[must_use]
    pub fn is_operational(self) -> bool {
        self.health == MarketHealth::Normal && self.state == MarketState::Running
    }
}

/// Realtime channel names shared by the stream client and the handlers.
pub mod channels {
    /// Private channel carrying child order lifecycle events.
    pub const CHILD_ORDER_EVENTS: &str = "child_order_events";

    /// Public board snapshot channel for a product.
    #[must_use]
    pub fn board_snapshot(product_code: &str) -> String {
        format!("lightning_board_snapshot_{product_code}")
    }
}
