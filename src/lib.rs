// src/lib.rs
//! Semi-automated portfolio liquidation for a Binance-style spot account:
//! a background ticker poller, a market-metadata catalog for legal order
//! sizing, and a conversion engine that sells every non-reserve asset into
//! a stable quote asset, directly or through an intermediate. A safety gate
//! decides whether actions are simulated or actually submitted.

pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

pub use crate::config::AppConfig;
pub use crate::connectors::binance::BinanceGateway;
pub use crate::connectors::traits::ExchangeGateway;
pub use crate::core::catalog::{MarketCatalog, MarketInfo};
pub use crate::core::engine::{LiquidationEngine, OrderExecutor, OrderOutcome, BANNED_ASSETS};
pub use crate::core::gate::SafetyGate;
pub use crate::core::logsink::{LogEntry, LogSink, LOG_CAPACITY};
pub use crate::core::poller::{PriceMap, TickerPoller, DEFAULT_SYMBOLS};
pub use crate::core::service::PortfolioService;
pub use crate::core::withdraw::{WithdrawalManager, WithdrawalOutcome};
pub use crate::error::{EngineError, GatewayError};
pub use crate::types::{
    AssetBalance, ConversionOutcome, Credentials, LiquidationReport, MarketEntry, OpenOrder,
    OrderResponse, Side, Symbol, WithdrawalReceipt,
};
