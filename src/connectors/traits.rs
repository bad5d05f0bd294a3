// src/connectors/traits.rs
use crate::error::GatewayError;
use crate::types::{
    AssetBalance, Credentials, MarketEntry, OpenOrder, OrderResponse, Side, Symbol,
    WithdrawalReceipt,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The narrow exchange contract the engine depends on. Implementations own
/// authentication, transport and response validation; everything past this
/// boundary works with typed values only.
///
/// Connecting without credentials yields a read-only session: market-data
/// calls work, account and trading calls fail fast with `Unauthenticated`.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Verifies connectivity, stores (or clears) credentials and returns a
    /// fresh catalog snapshot.
    async fn connect(&self, credentials: Option<Credentials>) -> GatewayResult<Vec<MarketEntry>>;

    async fn fetch_markets(&self) -> GatewayResult<Vec<MarketEntry>>;

    /// Last-trade price for one symbol; `None` when the exchange does not
    /// know the pair.
    async fn fetch_ticker(&self, symbol: &Symbol) -> GatewayResult<Option<Decimal>>;

    /// One full ticker snapshot for all known symbols.
    async fn fetch_tickers(&self) -> GatewayResult<HashMap<Symbol, Decimal>>;

    async fn fetch_balances(&self) -> GatewayResult<HashMap<String, AssetBalance>>;

    async fn fetch_open_orders(&self) -> GatewayResult<Vec<OpenOrder>>;

    async fn cancel_order(&self, order_id: &str, symbol: &Symbol) -> GatewayResult<()>;

    async fn place_market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
    ) -> GatewayResult<OrderResponse>;

    async fn place_limit_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> GatewayResult<OrderResponse>;

    async fn withdraw(
        &self,
        asset: &str,
        amount: Decimal,
        address: &str,
        network: &str,
    ) -> GatewayResult<WithdrawalReceipt>;
}
