use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use torii_broker::{ExchangeApi, GatewayResult};
use torii_core::{
    Balance, BoardState, Collateral, CollateralHistoryEntry, MarketHealth, MarketState, Order,
    OrderState, Position,
};

/// In-memory `ExchangeApi` with scripted responses and call counters.
pub struct StubExchange {
    board_state: Mutex<BoardState>,
    orders: Mutex<Vec<Order>>,
    balances: Mutex<Vec<Balance>>,
    collateral: Mutex<Collateral>,
    positions: Mutex<Vec<Position>>,
    history: Mutex<Vec<CollateralHistoryEntry>>,
    board_state_calls: AtomicUsize,
    child_orders_calls: AtomicUsize,
    balances_calls: AtomicUsize,
    collateral_calls: AtomicUsize,
    positions_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl Default for StubExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl StubExchange {
    pub fn new() -> Self {
        Self {
            board_state: Mutex::new(BoardState {
                health: MarketHealth::Normal,
                state: MarketState::Running,
            }),
            orders: Mutex::new(Vec::new()),
            balances: Mutex::new(Vec::new()),
            collateral: Mutex::new(Collateral {
                collateral: 0.0,
                open_position_pnl: None,
                require_collateral: None,
                keep_rate: None,
            }),
            positions: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            board_state_calls: AtomicUsize::new(0),
            child_orders_calls: AtomicUsize::new(0),
            balances_calls: AtomicUsize::new(0),
            collateral_calls: AtomicUsize::new(0),
            positions_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_board_state(self, board_state: BoardState) -> Self {
        *self.board_state.lock().unwrap() = board_state;
        self
    }

    #[must_use]
    pub fn with_orders(self, orders: Vec<Order>) -> Self {
        *self.orders.lock().unwrap() = orders;
        self
    }

    #[must_use]
    pub fn with_balances(self, balances: Vec<Balance>) -> Self {
        *self.balances.lock().unwrap() = balances;
        self
    }

    #[must_use]
    pub fn with_collateral(self, collateral: Collateral) -> Self {
        *self.collateral.lock().unwrap() = collateral;
        self
    }

    #[must_use]
    pub fn with_positions(self, positions: Vec<Position>) -> Self {
        *self.positions.lock().unwrap() = positions;
        self
    }

    /// History entries must be provided newest first, as the exchange returns
    /// them.
    #[must_use]
    pub fn with_history(self, history: Vec<CollateralHistoryEntry>) -> Self {
        *self.history.lock().unwrap() = history;
        self
    }

    pub fn set_board_state(&self, board_state: BoardState) {
        *self.board_state.lock().unwrap() = board_state;
    }

    pub fn push_history(&self, entry: CollateralHistoryEntry) {
        self.history.lock().unwrap().insert(0, entry);
    }

    pub fn board_state_calls(&self) -> usize {
        self.board_state_calls.load(Ordering::SeqCst)
    }

    pub fn child_orders_calls(&self) -> usize {
        self.child_orders_calls.load(Ordering::SeqCst)
    }

    pub fn balances_calls(&self) -> usize {
        self.balances_calls.load(Ordering::SeqCst)
    }

    pub fn collateral_calls(&self) -> usize {
        self.collateral_calls.load(Ordering::SeqCst)
    }

    pub fn positions_calls(&self) -> usize {
        self.positions_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeApi for StubExchange {
    async fn board_state(&self, _product_code: &str) -> GatewayResult<BoardState> {
        self.board_state_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.board_state.lock().unwrap())
    }

    async fn child_orders(
        &self,
        _product_code: &str,
        state: OrderState,
    ) -> GatewayResult<Vec<Order>> {
        self.child_orders_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.state == state)
            .cloned()
            .collect())
    }

    async fn balances(&self) -> GatewayResult<Vec<Balance>> {
        self.balances_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn collateral(&self) -> GatewayResult<Collateral> {
        self.collateral_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collateral.lock().unwrap().clone())
    }

    async fn positions(&self, _product_code: &str) -> GatewayResult<Vec<Position>> {
        self.positions_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn collateral_history(
        &self,
        after: Option<i64>,
        count: Option<u32>,
    ) -> GatewayResult<Vec<CollateralHistoryEntry>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let history = self.history.lock().unwrap();
        let filtered = history
            .iter()
            .filter(|e| after.map_or(true, |cursor| e.id > cursor))
            .take(count.map(|c| c as usize).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(filtered)
    }
}
