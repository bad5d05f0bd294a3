// src/core/service.rs
use crate::connectors::traits::ExchangeGateway;
use crate::core::catalog::MarketCatalog;
use crate::core::engine::{LiquidationEngine, OrderExecutor, OrderOutcome};
use crate::core::gate::SafetyGate;
use crate::core::logsink::{LogEntry, LogSink};
use crate::core::poller::{PriceMap, TickerPoller};
use crate::core::withdraw::{WithdrawalManager, WithdrawalOutcome};
use crate::error::{EngineError, GatewayError};
use crate::types::{Credentials, LiquidationReport, Side, Symbol};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// The command surface the front-end drives. Owns the shared state (price
/// map, log sink, safety gate, market catalog) and wires it into the poller,
/// the liquidation engine and the withdrawal manager, all backed by one
/// gateway instance.
pub struct PortfolioService {
    gateway: Arc<dyn ExchangeGateway>,
    catalog: Arc<MarketCatalog>,
    prices: Arc<PriceMap>,
    sink: Arc<LogSink>,
    gate: Arc<SafetyGate>,
    poller: TickerPoller,
    engine: LiquidationEngine,
    executor: OrderExecutor,
    withdrawals: WithdrawalManager,
}

impl PortfolioService {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        let catalog = Arc::new(MarketCatalog::new());
        let prices: Arc<PriceMap> = Arc::new(RwLock::new(HashMap::new()));
        let sink = Arc::new(LogSink::new());
        let gate = Arc::new(SafetyGate::new());

        let poller = TickerPoller::new(Arc::clone(&gateway), Arc::clone(&prices), Arc::clone(&sink));
        let engine = LiquidationEngine::new(
            Arc::clone(&gateway),
            Arc::clone(&catalog),
            Arc::clone(&gate),
            Arc::clone(&sink),
        );
        let executor =
            OrderExecutor::new(Arc::clone(&gateway), Arc::clone(&gate), Arc::clone(&sink));
        let withdrawals =
            WithdrawalManager::new(Arc::clone(&gateway), Arc::clone(&gate), Arc::clone(&sink));

        Self {
            gateway,
            catalog,
            prices,
            sink,
            gate,
            poller,
            engine,
            executor,
            withdrawals,
        }
    }

    /// Connects with the given keys (empty keys yield a read-only session)
    /// and reloads the market catalog from the snapshot. Returns the number
    /// of tradable markets.
    pub async fn set_credentials(&self, api_key: &str, secret_key: &str) -> Result<usize, EngineError> {
        let credentials = if api_key.is_empty() || secret_key.is_empty() {
            None
        } else {
            Some(Credentials {
                api_key: api_key.to_string(),
                secret_key: secret_key.to_string(),
            })
        };
        let authenticated = credentials.is_some();

        let snapshot = self
            .gateway
            .connect(credentials)
            .await
            .map_err(EngineError::GatewayUnavailable)?;
        let count = self.catalog.load(snapshot);

        let mode = if authenticated { "authenticated" } else { "read-only" };
        info!("exchange connected ({mode}), {count} markets loaded");
        self.sink
            .push(format!("exchange connected ({mode}), {count} markets loaded"));
        Ok(count)
    }

    /// Re-fetches market metadata without touching credentials. On failure
    /// the previous catalog stays in place.
    pub async fn refresh_catalog(&self) -> Result<usize, EngineError> {
        self.catalog.refresh(&*self.gateway).await
    }

    pub fn start_polling(&self, interval_secs: u64) {
        self.poller.start(interval_secs);
    }

    pub fn stop_polling(&self) {
        self.poller.stop();
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn set_trading_enabled(&self, enabled: bool) {
        self.gate.set_live(enabled);
        let state = if enabled { "LIVE" } else { "simulate-only" };
        info!("trading mode set to {state}");
        self.sink.push(format!("trading mode set to {state}"));
    }

    pub fn trading_enabled(&self) -> bool {
        self.gate.is_live()
    }

    /// Snapshot copy of the latest prices; the live map stays with the poller.
    pub fn latest_prices(&self) -> HashMap<Symbol, Decimal> {
        self.prices.read().unwrap().clone()
    }

    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.sink.drain()
    }

    pub async fn liquidate_to_quote(
        &self,
        quote_asset: &str,
        dust_threshold: Decimal,
    ) -> Result<LiquidationReport, EngineError> {
        self.engine
            .liquidate_to_quote(quote_asset, dust_threshold)
            .await
    }

    pub async fn total_portfolio_value(&self, quote_asset: &str) -> Result<Decimal, EngineError> {
        self.engine.total_portfolio_value(quote_asset).await
    }

    pub async fn place_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderOutcome, GatewayError> {
        self.executor.place_order(symbol, side, quantity, price).await
    }

    pub async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        network: &str,
        min_amount: Decimal,
    ) -> Result<WithdrawalOutcome, EngineError> {
        self.withdrawals
            .withdraw(asset, address, network, min_amount)
            .await
    }
}
