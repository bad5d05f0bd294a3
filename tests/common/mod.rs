// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use sweepdust::connectors::traits::{ExchangeGateway, GatewayResult};
use sweepdust::error::GatewayError;
use sweepdust::types::{
    AssetBalance, Credentials, MarketEntry, OpenOrder, OrderResponse, Side, Symbol,
    WithdrawalReceipt,
};

/// Scripted gateway double. Every call is journaled so tests can assert
/// which endpoints were (or were not) hit.
#[derive(Default)]
pub struct MockGateway {
    pub balances: Mutex<HashMap<String, AssetBalance>>,
    pub tickers: HashMap<Symbol, Decimal>,
    pub markets: Vec<MarketEntry>,
    pub open_orders: Mutex<Vec<OpenOrder>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_open_orders: bool,
    pub fail_markets: bool,
    pub fail_cancel_ids: HashSet<String>,
    pub fail_ticker_for: HashSet<Symbol>,
    pub reject_orders_on: HashSet<Symbol>,
    /// symbol -> (asset, free amount) credited to the balance when a market
    /// order on that symbol fills. Lets chained-conversion tests model
    /// proceeds landing (or not landing) after leg 1.
    pub credit_on_fill: HashMap<Symbol, (String, Decimal)>,
    pub balance_delay: Option<Duration>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, asset: &str, free: Decimal, total: Decimal) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), AssetBalance { free, total });
        self
    }

    pub fn with_ticker(mut self, symbol: &str, price: Decimal) -> Self {
        self.tickers.insert(symbol.parse().unwrap(), price);
        self
    }

    pub fn with_market(mut self, symbol: &str, min_notional: Decimal, step: Option<&str>) -> Self {
        self.markets.push(MarketEntry {
            symbol: symbol.parse().unwrap(),
            min_notional,
            step_size: step.map(str::to_string),
        });
        self
    }

    pub fn with_open_order(self, id: &str, symbol: &str) -> Self {
        self.open_orders.lock().unwrap().push(OpenOrder {
            id: id.to_string(),
            symbol: symbol.parse().unwrap(),
        });
        self
    }

    pub fn with_credit_on_fill(mut self, symbol: &str, asset: &str, free: Decimal) -> Self {
        self.credit_on_fill
            .insert(symbol.parse().unwrap(), (asset.to_string(), free));
        self
    }

    pub fn with_rejected_orders_on(mut self, symbol: &str) -> Self {
        self.reject_orders_on.insert(symbol.parse().unwrap());
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that would have side effects on the exchange.
    pub fn submission_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                c.starts_with("place_market") || c.starts_with("place_limit") || c.starts_with("withdraw")
            })
            .count()
    }

    pub fn ticker_fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("fetch_ticker"))
            .count()
    }
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    async fn connect(&self, _credentials: Option<Credentials>) -> GatewayResult<Vec<MarketEntry>> {
        self.record("connect".to_string());
        Ok(self.markets.clone())
    }

    async fn fetch_markets(&self) -> GatewayResult<Vec<MarketEntry>> {
        self.record("fetch_markets".to_string());
        if self.fail_markets {
            return Err(GatewayError::Rejected("exchangeInfo unavailable".to_string()));
        }
        Ok(self.markets.clone())
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> GatewayResult<Option<Decimal>> {
        self.record(format!("fetch_ticker {symbol}"));
        if self.fail_ticker_for.contains(symbol) {
            return Err(GatewayError::Rejected("ticker unavailable".to_string()));
        }
        Ok(self.tickers.get(symbol).copied())
    }

    async fn fetch_tickers(&self) -> GatewayResult<HashMap<Symbol, Decimal>> {
        self.record("fetch_tickers".to_string());
        Ok(self.tickers.clone())
    }

    async fn fetch_balances(&self) -> GatewayResult<HashMap<String, AssetBalance>> {
        self.record("fetch_balances".to_string());
        if let Some(delay) = self.balance_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn fetch_open_orders(&self) -> GatewayResult<Vec<OpenOrder>> {
        self.record("fetch_open_orders".to_string());
        if self.fail_open_orders {
            return Err(GatewayError::Rejected("open orders unavailable".to_string()));
        }
        Ok(self.open_orders.lock().unwrap().clone())
    }

    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> GatewayResult<()> {
        self.record(format!("cancel_order {order_id} {symbol}"));
        if self.fail_cancel_ids.contains(order_id) {
            return Err(GatewayError::Rejected("unknown order".to_string()));
        }
        Ok(())
    }

    async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> GatewayResult<OrderResponse> {
        self.record(format!("place_market {} {symbol} {quantity}", side.as_str()));
        if self.reject_orders_on.contains(symbol) {
            return Err(GatewayError::Rejected("insufficient liquidity".to_string()));
        }
        if let Some((asset, free)) = self.credit_on_fill.get(symbol) {
            let mut balances = self.balances.lock().unwrap();
            let entry = balances.entry(asset.clone()).or_default();
            entry.free = *free;
            entry.total = *free;
        }
        Ok(OrderResponse {
            id: "1".to_string(),
            symbol: symbol.exchange_id(),
            status: "FILLED".to_string(),
        })
    }

    async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> GatewayResult<OrderResponse> {
        self.record(format!(
            "place_limit {} {symbol} {quantity} @ {price}",
            side.as_str()
        ));
        if self.reject_orders_on.contains(symbol) {
            return Err(GatewayError::Rejected("insufficient liquidity".to_string()));
        }
        Ok(OrderResponse {
            id: "2".to_string(),
            symbol: symbol.exchange_id(),
            status: "NEW".to_string(),
        })
    }

    async fn withdraw(
        &self,
        asset: &str,
        amount: Decimal,
        address: &str,
        network: &str,
    ) -> GatewayResult<WithdrawalReceipt> {
        self.record(format!("withdraw {amount} {asset} to {address} via {network}"));
        Ok(WithdrawalReceipt {
            id: "wd-1".to_string(),
        })
    }
}
