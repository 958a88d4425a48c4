//! # Escrow Trade Daemon
//!
//! Main entry point: loads configuration, wires the adapters and runs the
//! reconciliation engine until Ctrl-C.

use escrow_trade::application::ports::{TradeService, TradeStore};
use escrow_trade::application::protocol::ProtocolContext;
use escrow_trade::application::services::ReconciliationEngine;
use escrow_trade::config::{AppConfig, LogConfig, LogFormat, ServiceBackend, StorageBackend};
use escrow_trade::infrastructure::persistence::{FileTradeStore, InMemoryTradeStore};
use escrow_trade::infrastructure::trade_service::{
    HttpTradeService, HttpTradeServiceConfig, InMemoryTradeService,
};
use escrow_trade::infrastructure::wallet::{SimulatedChain, SimulatedWallet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.log);
    config.validate()?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        profile = %config.profile.pub_key,
        "Starting escrow trade daemon v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service: Arc<dyn TradeService> = match config.trade_service.backend {
        ServiceBackend::Http => {
            let http = HttpTradeServiceConfig::new(config.trade_service.url()?)
                .with_timeout(Duration::from_secs(config.trade_service.request_timeout_secs));
            Arc::new(HttpTradeService::new(http)?)
        }
        ServiceBackend::Memory => {
            warn!("using in-memory trade service, trades stay in this process");
            Arc::new(InMemoryTradeService::new())
        }
    };

    let store: Arc<dyn TradeStore> = match config.storage.backend {
        StorageBackend::File => Arc::new(FileTradeStore::open(&config.storage.trades_dir).await?),
        StorageBackend::Memory => Arc::new(InMemoryTradeStore::new()),
    };

    let chain = SimulatedChain::new();
    let wallet = SimulatedWallet::new(chain.clone(), config.escrow_pub_key())
        .with_tx_fee(config.wallet.tx_fee);
    if !config.wallet.initial_balance.is_zero() {
        chain
            .credit(wallet.address(), config.wallet.initial_balance)
            .await;
    }
    let context = ProtocolContext::new(Arc::new(wallet), Arc::new(config.profile.profile()));

    let engine = ReconciliationEngine::new(context, service, store, config.engine.engine_config());
    let mut events = engine.subscribe();
    engine.load().await?;
    let handle = engine.start();

    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    event = event.event_name(),
                    trade_id = %event.trade_id(),
                    status = ?event.status(),
                    "trade event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "trade events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Escrow trade daemon started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down escrow trade daemon");

    handle.shutdown().await;
    drop(engine);
    if let Err(err) = reporter.await {
        warn!(error = %err, "event reporter failed");
    }

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(log.include_target);
    match (log.format, log.include_timestamps) {
        (LogFormat::Json, true) => builder.json().with_current_span(log.include_spans).init(),
        (LogFormat::Json, false) => builder
            .json()
            .with_current_span(log.include_spans)
            .without_time()
            .init(),
        (LogFormat::Pretty, true) => builder.pretty().init(),
        (LogFormat::Pretty, false) => builder.pretty().without_time().init(),
    }
}
