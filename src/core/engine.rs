// src/core/engine.rs
use crate::connectors::traits::ExchangeGateway;
use crate::core::catalog::MarketCatalog;
use crate::core::gate::SafetyGate;
use crate::core::logsink::LogSink;
use crate::error::{EngineError, GatewayError};
use crate::types::{ConversionOutcome, LiquidationReport, OrderResponse, Side, Symbol};
use crate::utils::precision::truncate_quantity;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Delisted or illiquid assets the exchange does not reliably support.
/// Invisible to every conversion and valuation pass.
pub const BANNED_ASSETS: &[&str] = &[
    "BCD", "CND", "MTH", "NCASH", "YOYO", "COVER", "DLT", "GVT", "SKY", "POA", "GRS", "NAS", "GO",
    "HOOK", "PDA", "ALGO", "CHR", "DGB", "GMX", "DCR", "PEPE", "ZEN", "AKRO", "BLZ", "WRX",
    "BADGER", "BAL", "BETA", "CREAM", "CTXC", "ELF", "FIRO", "HARD", "NULS", "PROS", "SNT", "TROY",
    "UFT", "VIDT", "ANIME", "STRK", "THE", "ALPHA", "BSW", "KMD", "LEVER", "LTO", "AION",
];

/// Candidates for chained conversion when no direct market exists, tried in
/// this order.
const INTERMEDIATE_ASSETS: [&str; 4] = ["BTC", "ETH", "BNB", "BUSD"];

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(400);
const DEFAULT_SETTLE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub enum OrderOutcome {
    /// Trading disabled at the moment of submission; nothing hit the wire.
    Simulated,
    Executed(OrderResponse),
}

/// Places a single order through the gateway, gated by the safety switch.
/// The intent is logged before submission and the result after, so every
/// attempt leaves a trace even when the gateway call fails.
pub struct OrderExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    gate: Arc<SafetyGate>,
    sink: Arc<LogSink>,
}

impl OrderExecutor {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        gate: Arc<SafetyGate>,
        sink: Arc<LogSink>,
    ) -> Self {
        Self {
            gateway,
            gate,
            sink,
        }
    }

    pub async fn place_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderOutcome, GatewayError> {
        let kind = match price {
            Some(p) => format!("limit @ {p}"),
            None => "market".to_string(),
        };
        self.sink.push(format!(
            "order request: {} {} {} ({})",
            side.as_str(),
            quantity,
            symbol,
            kind
        ));

        if !self.gate.is_live() {
            self.sink.push(format!(
                "(simulated) {} {} {} not submitted",
                side.as_str(),
                quantity,
                symbol
            ));
            return Ok(OrderOutcome::Simulated);
        }

        let result = match price {
            None => self.gateway.place_market_order(symbol, side, quantity).await,
            Some(p) => {
                self.gateway
                    .place_limit_order(symbol, side, quantity, p)
                    .await
            }
        };

        match &result {
            Ok(resp) => self.sink.push(format!(
                "order accepted: {} on {} (status {})",
                resp.id, resp.symbol, resp.status
            )),
            Err(e) => self.sink.push(format!("order failed on {symbol}: {e}")),
        }
        result.map(OrderOutcome::Executed)
    }
}

/// Orchestrates a liquidation pass: cancel stale orders, snapshot balances
/// and prices once, then convert every eligible asset to the quote asset
/// directly or through an intermediate. Per-asset failures never abort the
/// pass; they become entries in the aggregate report.
///
/// Not reentrant: a second call while a pass is running gets `PassInFlight`.
pub struct LiquidationEngine {
    gateway: Arc<dyn ExchangeGateway>,
    catalog: Arc<MarketCatalog>,
    gate: Arc<SafetyGate>,
    sink: Arc<LogSink>,
    executor: OrderExecutor,
    in_flight: AtomicBool,
    settle_delay: Duration,
    settle_attempts: u32,
}

impl LiquidationEngine {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        catalog: Arc<MarketCatalog>,
        gate: Arc<SafetyGate>,
        sink: Arc<LogSink>,
    ) -> Self {
        let executor = OrderExecutor::new(Arc::clone(&gateway), Arc::clone(&gate), Arc::clone(&sink));
        Self {
            gateway,
            catalog,
            gate,
            sink,
            executor,
            in_flight: AtomicBool::new(false),
            settle_delay: DEFAULT_SETTLE_DELAY,
            settle_attempts: DEFAULT_SETTLE_ATTEMPTS,
        }
    }

    /// Overrides the post-trade settling wait (tests use a near-zero delay).
    pub fn with_settle(mut self, delay: Duration, attempts: u32) -> Self {
        self.settle_delay = delay;
        self.settle_attempts = attempts.max(1);
        self
    }

    pub async fn liquidate_to_quote(
        &self,
        quote_asset: &str,
        dust_threshold: Decimal,
    ) -> Result<LiquidationReport, EngineError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::PassInFlight);
        }
        let result = self.run_pass(quote_asset, dust_threshold).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_pass(
        &self,
        quote_asset: &str,
        dust_threshold: Decimal,
    ) -> Result<LiquidationReport, EngineError> {
        let quote = quote_asset.trim().to_uppercase();
        info!("liquidation pass started: target {quote}, dust threshold {dust_threshold}");
        self.sink.push(format!(
            "liquidation pass started: target {quote}, dust threshold {dust_threshold}"
        ));

        self.cancel_open_orders().await?;

        // One snapshot for the whole pass keeps valuation decisions
        // internally consistent.
        let balances = self
            .gateway
            .fetch_balances()
            .await
            .map_err(EngineError::GatewayUnavailable)?;
        let tickers = self
            .gateway
            .fetch_tickers()
            .await
            .map_err(EngineError::GatewayUnavailable)?;

        let mut holdings: Vec<(String, Decimal)> = balances
            .into_iter()
            .filter(|(asset, bal)| {
                bal.total > Decimal::ZERO
                    && *asset != quote
                    && !BANNED_ASSETS.contains(&asset.as_str())
            })
            .map(|(asset, bal)| (asset, bal.total))
            .collect();
        holdings.sort_by(|a, b| a.0.cmp(&b.0));

        let mut outcomes = Vec::with_capacity(holdings.len());
        for (asset, amount) in holdings {
            let outcome = self
                .convert_asset(&asset, amount, &quote, dust_threshold, &tickers)
                .await;
            outcomes.push(outcome);
        }

        self.sink.push(format!(
            "liquidation pass finished: {} asset(s) processed",
            outcomes.len()
        ));
        Ok(LiquidationReport {
            completed: true,
            outcomes,
        })
    }

    /// A failure to list open orders is fatal for the pass; a failure to
    /// cancel an individual order is logged and skipped.
    async fn cancel_open_orders(&self) -> Result<(), EngineError> {
        let open = self
            .gateway
            .fetch_open_orders()
            .await
            .map_err(EngineError::GatewayUnavailable)?;

        if open.is_empty() {
            self.sink.push("no open orders to cancel");
            return Ok(());
        }

        for order in open {
            match self.gateway.cancel_order(&order.id, &order.symbol).await {
                Ok(()) => self
                    .sink
                    .push(format!("cancelled open order {} on {}", order.id, order.symbol)),
                Err(e) => {
                    warn!("failed to cancel order {} on {}: {e}", order.id, order.symbol);
                    self.sink.push(format!(
                        "failed to cancel order {} on {}: {e}",
                        order.id, order.symbol
                    ));
                }
            }
        }

        // Cancelled orders release locked balances with a short lag.
        tokio::time::sleep(self.settle_delay).await;
        Ok(())
    }

    async fn convert_asset(
        &self,
        asset: &str,
        amount: Decimal,
        quote: &str,
        dust_threshold: Decimal,
        tickers: &HashMap<Symbol, Decimal>,
    ) -> ConversionOutcome {
        let direct = Symbol::new(asset, quote);
        // An unknown price values the holding at zero, which routes it to
        // the dust skip rather than a blind order.
        let value = direct
            .as_ref()
            .and_then(|sym| tickers.get(sym))
            .map(|price| amount * price)
            .unwrap_or(Decimal::ZERO);

        if value < dust_threshold {
            self.sink.push(format!(
                "skipping {asset}: value {value} below dust threshold {dust_threshold}"
            ));
            return ConversionOutcome::Skipped {
                asset: asset.to_string(),
                reason: "below dust threshold".to_string(),
            };
        }

        match direct {
            Some(sym) if self.catalog.contains(&sym) => {
                self.sell_direct(asset, amount, value, &sym, quote).await
            }
            _ => self.convert_via_intermediate(asset, amount, quote).await,
        }
    }

    async fn sell_direct(
        &self,
        asset: &str,
        amount: Decimal,
        value: Decimal,
        symbol: &Symbol,
        quote: &str,
    ) -> ConversionOutcome {
        let min_notional = self.catalog.min_notional(symbol);
        if value < min_notional {
            self.sink.push(format!(
                "skipping {asset}: value {value} below exchange minimum notional {min_notional}"
            ));
            return ConversionOutcome::Skipped {
                asset: asset.to_string(),
                reason: "below exchange minimum notional".to_string(),
            };
        }

        let quantity = truncate_quantity(amount, self.catalog.precision(symbol));
        if quantity.is_zero() {
            self.sink
                .push(format!("skipping {asset}: quantity rounds to zero"));
            return ConversionOutcome::Skipped {
                asset: asset.to_string(),
                reason: "quantity rounds to zero".to_string(),
            };
        }

        self.sink
            .push(format!("direct sale: {asset} -> {quote}, qty {quantity}"));
        match self
            .executor
            .place_order(symbol, Side::Sell, quantity, None)
            .await
        {
            Ok(OrderOutcome::Simulated) => ConversionOutcome::Simulated {
                asset: asset.to_string(),
                path: vec![quote.to_string()],
            },
            Ok(OrderOutcome::Executed(_)) => ConversionOutcome::Success {
                asset: asset.to_string(),
                path: vec![quote.to_string()],
            },
            // A rejected direct sale is terminal for the asset; the
            // intermediate path only applies when no direct market exists.
            Err(e) => ConversionOutcome::Failed {
                asset: asset.to_string(),
                reason: e.to_string(),
            },
        }
    }

    async fn convert_via_intermediate(
        &self,
        asset: &str,
        amount: Decimal,
        quote: &str,
    ) -> ConversionOutcome {
        for inter in INTERMEDIATE_ASSETS {
            if inter == asset || inter == quote {
                continue;
            }
            let (Some(leg1), Some(leg2)) = (Symbol::new(asset, inter), Symbol::new(inter, quote))
            else {
                continue;
            };
            if !(self.catalog.contains(&leg1) && self.catalog.contains(&leg2)) {
                continue;
            }

            let quantity = truncate_quantity(amount, self.catalog.precision(&leg1));
            if quantity.is_zero() {
                self.sink.push(format!(
                    "chained sale via {inter} skipped: {asset} quantity rounds to zero"
                ));
                continue;
            }

            self.sink.push(format!(
                "chained sale via {inter}: {asset} -> {inter} -> {quote}, qty {quantity}"
            ));

            if !self.gate.is_live() {
                self.sink.push(format!(
                    "(simulated) chained orders for {asset} not submitted"
                ));
                return ConversionOutcome::Simulated {
                    asset: asset.to_string(),
                    path: vec![inter.to_string(), quote.to_string()],
                };
            }

            match self
                .executor
                .place_order(&leg1, Side::Sell, quantity, None)
                .await
            {
                Ok(OrderOutcome::Executed(_)) => {}
                // The gate was switched off between legs.
                Ok(OrderOutcome::Simulated) => {
                    return ConversionOutcome::Simulated {
                        asset: asset.to_string(),
                        path: vec![inter.to_string(), quote.to_string()],
                    }
                }
                Err(e) => {
                    self.sink
                        .push(format!("leg 1 via {inter} failed for {asset}: {e}"));
                    continue;
                }
            }

            // Leg 2 is sized from actual proceeds, which need a moment to
            // land on the balance.
            let proceeds = self.settled_free_balance(inter).await;
            if proceeds.is_zero() {
                self.sink.push(format!(
                    "no {inter} proceeds after settling; trying next intermediate for {asset}"
                ));
                continue;
            }

            let quantity2 = truncate_quantity(proceeds, self.catalog.precision(&leg2));
            if quantity2.is_zero() {
                self.sink.push(format!(
                    "{inter} proceeds {proceeds} round to zero; trying next intermediate"
                ));
                continue;
            }

            match self
                .executor
                .place_order(&leg2, Side::Sell, quantity2, None)
                .await
            {
                Ok(OrderOutcome::Executed(_)) => {
                    return ConversionOutcome::Success {
                        asset: asset.to_string(),
                        path: vec![inter.to_string(), quote.to_string()],
                    }
                }
                Ok(OrderOutcome::Simulated) => {
                    return ConversionOutcome::Simulated {
                        asset: asset.to_string(),
                        path: vec![inter.to_string(), quote.to_string()],
                    }
                }
                Err(e) => {
                    self.sink
                        .push(format!("leg 2 via {inter} failed for {asset}: {e}"));
                    continue;
                }
            }
        }

        self.sink.push(format!("no convertible path for {asset}"));
        ConversionOutcome::Failed {
            asset: asset.to_string(),
            reason: "no convertible path".to_string(),
        }
    }

    /// Bounded retry poll of the free balance after a trade, in place of a
    /// single blind sleep. Returns zero when nothing lands in time.
    async fn settled_free_balance(&self, asset: &str) -> Decimal {
        for _ in 0..self.settle_attempts {
            tokio::time::sleep(self.settle_delay).await;
            match self.gateway.fetch_balances().await {
                Ok(balances) => {
                    let free = balances
                        .get(asset)
                        .map(|bal| bal.free)
                        .unwrap_or(Decimal::ZERO);
                    if free > Decimal::ZERO {
                        return free;
                    }
                }
                Err(e) => {
                    warn!("balance re-read failed while settling {asset}: {e}");
                    self.sink
                        .push(format!("balance re-read failed while settling {asset}: {e}"));
                }
            }
        }
        Decimal::ZERO
    }

    /// Values the whole account in the quote asset from one balances +
    /// tickers snapshot. Banned and unpriceable assets contribute zero.
    pub async fn total_portfolio_value(&self, quote_asset: &str) -> Result<Decimal, EngineError> {
        let quote = quote_asset.trim().to_uppercase();
        let balances = self
            .gateway
            .fetch_balances()
            .await
            .map_err(EngineError::GatewayUnavailable)?;
        let tickers = self
            .gateway
            .fetch_tickers()
            .await
            .map_err(EngineError::GatewayUnavailable)?;

        let mut total = Decimal::ZERO;
        for (asset, bal) in &balances {
            if bal.total <= Decimal::ZERO || BANNED_ASSETS.contains(&asset.as_str()) {
                continue;
            }
            if *asset == quote {
                total += bal.total;
                continue;
            }
            if let Some(sym) = Symbol::new(asset, &quote) {
                if let Some(price) = tickers.get(&sym) {
                    total += bal.total * price;
                }
            }
        }
        Ok(total)
    }
}
