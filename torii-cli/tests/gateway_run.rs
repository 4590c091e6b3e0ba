//! End-to-end wiring: a scripted Realtime endpoint drives real handlers and
//! books backed by the stub exchange.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::json;
use tokio::time::{sleep, timeout, Instant};

use torii_agent::{Agent, RandomAgent};
use torii_books::{DataStore, OrderBook, Portfolio, PositionBook};
use torii_broker::PauseSwitch;
use torii_core::{OrderState, Side};
use torii_lightning::{LightningCredentials, LightningStream};
use torii_runtime::handlers::{BoardEventHandler, ChildOrderEventHandler};
use torii_runtime::{HandlerDispatcher, MessageHandler};
use torii_test_utils::{MockStreamServer, StubExchange};

const PRODUCT: &str = "FX_BTC_JPY";

async fn wait_until<F, Fut>(what: &str, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition().await {
            return Ok(());
        }
        sleep(Duration::from_millis(25)).await;
    }
    bail!("timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread")]
async fn child_order_events_flow_into_the_books() -> Result<()> {
    let mut server = MockStreamServer::spawn().await?;
    let exchange = Arc::new(StubExchange::new());

    let order_book = Arc::new(OrderBook::new(exchange.clone(), PRODUCT));
    let position_book = Arc::new(PositionBook::new(exchange.clone(), PRODUCT));
    let portfolio = Arc::new(Portfolio::new(exchange.clone(), "JPY", PRODUCT));
    let data_store = Arc::new(DataStore::new(4));
    let agent: Arc<dyn Agent> = Arc::new(RandomAgent::new(PRODUCT));

    let handlers: Vec<Arc<dyn MessageHandler>> = vec![
        Arc::new(BoardEventHandler::new(data_store.clone(), agent, PRODUCT)),
        Arc::new(ChildOrderEventHandler::new(
            order_book.clone(),
            position_book.clone(),
            portfolio,
            PRODUCT,
        )),
    ];
    let dispatcher = Arc::new(HandlerDispatcher::new(handlers));

    let stream = Arc::new(LightningStream::new(
        server.url(),
        LightningCredentials {
            api_key: "test-key".into(),
            api_secret: "test-secret".into(),
        },
        dispatcher,
        PauseSwitch::new("stream"),
        PRODUCT,
    ));
    let stream_handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.run().await }
    });

    // Auth, board subscribe, then child_order_events subscribe after the ack.
    timeout(Duration::from_secs(5), server.wait_for_received(3)).await?;

    server
        .send_event(
            "child_order_events",
            json!([{
                "event_type": "ORDER",
                "product_code": PRODUCT,
                "child_order_id": "JOR-1",
                "child_order_acceptance_id": "JRF-1",
                "child_order_type": "LIMIT",
                "expire_date": "2026-08-12T08:45:53",
                "side": "BUY",
                "price": 6_400_000.0,
                "size": 0.5
            }]),
        )
        .await;
    wait_until("the order to land in the book", || {
        let order_book = order_book.clone();
        async move { order_book.len().await == 1 }
    })
    .await?;
    assert_eq!(order_book.orders().await[0].state, OrderState::Active);

    server
        .send_event(
            "child_order_events",
            json!([{
                "event_type": "EXECUTION",
                "child_order_acceptance_id": "JRF-1",
                "side": "BUY",
                "price": 6_400_000.0,
                "size": 0.5
            }]),
        )
        .await;
    wait_until("the execution to settle", || {
        let order_book = order_book.clone();
        async move { order_book.orders().await[0].state == OrderState::Completed }
    })
    .await?;

    // No opposite position existed, so the fill opened a new one.
    let positions = position_book.positions().await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].side, Side::Buy);
    assert_eq!(positions[0].size, 0.5);

    // The portfolio resynced on both events.
    assert_eq!(exchange.balances_calls(), 2);
    assert_eq!(exchange.collateral_calls(), 2);

    // Board snapshots reach the data store through the same dispatcher.
    server
        .send_event(
            &torii_core::channels::board_snapshot(PRODUCT),
            json!({ "mid_price": 6_500_000.0 }),
        )
        .await;
    wait_until("the snapshot to buffer", || {
        let data_store = data_store.clone();
        async move { data_store.len().await == 1 }
    })
    .await?;

    stream_handle.abort();
    server.shutdown().await;
    Ok(())
}
