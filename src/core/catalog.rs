// src/core/catalog.rs
use crate::connectors::traits::ExchangeGateway;
use crate::error::EngineError;
use crate::types::{MarketEntry, Symbol};
use crate::utils::precision::precision_from_step;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Precision applied when a market carries no usable step size.
pub const FALLBACK_PRECISION: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketInfo {
    pub min_notional: Decimal,
    pub quantity_precision: u32,
}

/// Cache of per-symbol trading constraints, derived once per catalog load.
/// The table is replaced wholesale on refresh, never patched in place; a
/// failed refresh leaves the previous table intact.
pub struct MarketCatalog {
    table: RwLock<HashMap<Symbol, MarketInfo>>,
}

impl MarketCatalog {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    pub async fn refresh(&self, gateway: &dyn ExchangeGateway) -> Result<usize, EngineError> {
        let snapshot = gateway
            .fetch_markets()
            .await
            .map_err(EngineError::CatalogUnavailable)?;
        Ok(self.load(snapshot))
    }

    /// Rebuilds the table from a raw snapshot, returning the market count.
    pub fn load(&self, snapshot: Vec<MarketEntry>) -> usize {
        let table: HashMap<Symbol, MarketInfo> = snapshot
            .into_iter()
            .map(|entry| {
                let quantity_precision = entry
                    .step_size
                    .as_deref()
                    .and_then(precision_from_step)
                    .unwrap_or(FALLBACK_PRECISION);
                (
                    entry.symbol,
                    MarketInfo {
                        min_notional: entry.min_notional,
                        quantity_precision,
                    },
                )
            })
            .collect();
        let count = table.len();
        *self.table.write().unwrap() = table;
        info!("market catalog loaded: {count} symbols");
        count
    }

    pub fn lookup(&self, symbol: &Symbol) -> Option<MarketInfo> {
        self.table.read().unwrap().get(symbol).copied()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.table.read().unwrap().contains_key(symbol)
    }

    pub fn min_notional(&self, symbol: &Symbol) -> Decimal {
        self.lookup(symbol)
            .map(|info| info.min_notional)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn precision(&self, symbol: &Symbol) -> u32 {
        self.lookup(symbol)
            .map(|info| info.quantity_precision)
            .unwrap_or(FALLBACK_PRECISION)
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MarketCatalog {
    fn default() -> Self {
        Self::new()
    }
}
