use std::sync::Arc;

use tokio::sync::Mutex;

use torii_broker::{ExchangeApi, GatewayResult};

#[derive(Default)]
struct Snapshot {
    legal_currency_amount: f64,
    crypto_currency_amount: f64,
    collateral_amount: f64,
}

/// Point-in-time view of account balances and collateral.
///
/// All three amounts are replaced together on every sync; partial patches
/// never happen.
pub struct Portfolio {
    exchange: Arc<dyn ExchangeApi>,
    legal_currency_code: String,
    crypto_currency_code: String,
    snapshot: Mutex<Snapshot>,
}

impl Portfolio {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        legal_currency_code: impl Into<String>,
        crypto_currency_code: impl Into<String>,
    ) -> Self {
        Self {
            exchange,
            legal_currency_code: legal_currency_code.into(),
            crypto_currency_code: crypto_currency_code.into(),
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Fetch balances and collateral and replace the snapshot wholesale.
    pub async fn sync(&self) -> GatewayResult<()> {
        let mut snapshot = self.snapshot.lock().await;
        let balances = self.exchange.balances().await?;
        let collateral = self.exchange.collateral().await?;

        let amount_of = |code: &str| {
            balances
                .iter()
                .find(|b| b.currency_code == code)
                .map(|b| b.amount)
                .unwrap_or(0.0)
        };
        *snapshot = Snapshot {
            legal_currency_amount: amount_of(&self.legal_currency_code),
            crypto_currency_amount: amount_of(&self.crypto_currency_code),
            collateral_amount: collateral.collateral,
        };
        Ok(())
    }

    pub async fn legal_currency_amount(&self) -> f64 {
        self.snapshot.lock().await.legal_currency_amount
    }

    pub async fn crypto_currency_amount(&self) -> f64 {
        self.snapshot.lock().await.crypto_currency_amount
    }

    pub async fn collateral_amount(&self) -> f64 {
        self.snapshot.lock().await.collateral_amount
    }
}
