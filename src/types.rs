// src/types.rs
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// A trading pair in canonical `BASE/QUOTE` form.
///
/// Invariant: base and quote are non-empty, uppercase and distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: &str, quote: &str) -> Option<Self> {
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        if base.is_empty() || quote.is_empty() || base == quote {
            return None;
        }
        Some(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Concatenated id used on the Binance wire, e.g. `BTCUSDT`.
    pub fn exchange_id(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| format!("symbol without '/': {s}"))?;
        Symbol::new(base, quote).ok_or_else(|| format!("invalid symbol: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
}

/// Free/total balance of a single asset, fetched fresh per pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub id: String,
}

/// One raw catalog row as the gateway reports it. The step size is kept as
/// the exchange's string so trailing zeros survive for precision inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEntry {
    pub symbol: Symbol,
    pub min_notional: Decimal,
    pub step_size: Option<String>,
}

/// Per-asset result of a liquidation pass. `path` lists the assets the
/// balance was (or would have been) routed through, ending in the quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionOutcome {
    Success { asset: String, path: Vec<String> },
    Simulated { asset: String, path: Vec<String> },
    Skipped { asset: String, reason: String },
    Failed { asset: String, reason: String },
}

impl ConversionOutcome {
    pub fn asset(&self) -> &str {
        match self {
            ConversionOutcome::Success { asset, .. }
            | ConversionOutcome::Simulated { asset, .. }
            | ConversionOutcome::Skipped { asset, .. }
            | ConversionOutcome::Failed { asset, .. } => asset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationReport {
    pub completed: bool,
    pub outcomes: Vec<ConversionOutcome>,
}
