use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use torii_agent::{Agent, RandomAgent};
use torii_books::{DataStore, OrderBook, Portfolio, PositionBook};
use torii_broker::{ExchangeApi, Notifier, PauseSwitch};
use torii_cli::{health, notify::LineNotifier, telemetry};
use torii_config::{load_config, AppConfig};
use torii_lightning::{LightningClient, LightningConfig, LightningCredentials, LightningStream};
use torii_runtime::handlers::{BoardEventHandler, ChildOrderEventHandler};
use torii_runtime::tasks::{HealthCheckTask, NotificationTask};
use torii_runtime::{BatchScheduler, BatchTask, HandlerDispatcher, MessageHandler};

/// Always-on trading gateway for bitFlyer Lightning.
#[derive(Parser)]
#[command(name = "torii", version)]
struct Args {
    /// Configuration environment layered over config/default.toml
    #[arg(long)]
    env: Option<String>,
    /// Override the log filter from configuration
    #[arg(long)]
    log_level: Option<String>,
    /// Write JSON logs to this file in addition to stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.env.as_deref()).context("failed to load configuration")?;
    let filter = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    telemetry::init_tracing(&filter, args.log_file.as_deref())?;

    run(config).await
}

/// Composition root: build every service once and hand references to the
/// components that need them, then drive the stream and the scheduler for
/// the process lifetime.
async fn run(config: AppConfig) -> Result<()> {
    let credentials = LightningCredentials {
        api_key: config.exchange.api_key.clone(),
        api_secret: config.exchange.api_secret.clone(),
    };
    let exchange: Arc<dyn ExchangeApi> = Arc::new(LightningClient::new(
        LightningConfig {
            base_url: config.exchange.rest_url.clone(),
        },
        Some(credentials.clone()),
    ));

    let order_book = Arc::new(OrderBook::new(
        exchange.clone(),
        config.crypto_currency_code.clone(),
    ));
    let position_book = Arc::new(PositionBook::new(
        exchange.clone(),
        config.crypto_currency_code.clone(),
    ));
    let portfolio = Arc::new(Portfolio::new(
        exchange.clone(),
        config.legal_currency_code.clone(),
        config.crypto_currency_code.clone(),
    ));
    let data_store = Arc::new(DataStore::new(config.data_store_size));
    let agent: Arc<dyn Agent> = Arc::new(RandomAgent::new(config.crypto_currency_code.clone()));

    let handlers: Vec<Arc<dyn MessageHandler>> = vec![
        Arc::new(BoardEventHandler::new(
            data_store,
            agent,
            &config.crypto_currency_code,
        )),
        Arc::new(ChildOrderEventHandler::new(
            order_book.clone(),
            position_book.clone(),
            portfolio.clone(),
            config.crypto_currency_code.clone(),
        )),
    ];
    let dispatcher = Arc::new(HandlerDispatcher::new(handlers));

    let stream_switch = PauseSwitch::new("stream");
    let stream = LightningStream::new(
        config.exchange.ws_url.clone(),
        credentials,
        dispatcher,
        stream_switch.clone(),
        &config.crypto_currency_code,
    );

    let notifier: Arc<dyn Notifier> = Arc::new(LineNotifier::new(&config.notifier));
    let tasks: Vec<Arc<dyn BatchTask>> = vec![
        Arc::new(HealthCheckTask::new(
            exchange.clone(),
            stream_switch,
            config.crypto_currency_code.clone(),
        )),
        Arc::new(
            NotificationTask::new(
                notifier,
                exchange.clone(),
                order_book.clone(),
                config.legal_currency_code.clone(),
            )
            .await
            .context("failed to seed the notification cursor")?,
        ),
    ];
    let scheduler = BatchScheduler::new(tasks);

    if config.health.enabled {
        let addr: SocketAddr = config
            .health
            .addr
            .parse()
            .with_context(|| format!("invalid health server address {}", config.health.addr))?;
        let (bound, _handle) = health::spawn_health_server(addr)?;
        info!(addr = %bound, "health endpoint listening");
    }

    tokio::try_join!(portfolio.sync(), order_book.sync(), position_book.sync())
        .context("initial synchronization failed")?;
    info!("initial synchronization complete");

    tokio::join!(scheduler.run(), stream.run());
    Ok(())
}
