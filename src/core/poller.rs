// src/core/poller.rs
use crate::connectors::traits::ExchangeGateway;
use crate::core::logsink::LogSink;
use crate::types::Symbol;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Symbols polled while nothing has been requested yet.
pub const DEFAULT_SYMBOLS: [&str; 6] = [
    "BTC/USDT",
    "ETH/USDT",
    "BNB/USDT",
    "ADA/USDT",
    "XRP/USDT",
    "DOGE/USDT",
];

/// Single-writer price map: the poller task writes, everyone else snapshots.
/// Readers accept staleness of up to one poll interval.
pub type PriceMap = RwLock<HashMap<Symbol, Decimal>>;

/// Background loop refreshing the shared price map at a fixed cadence.
///
/// `start` is idempotent (a running poller is never doubled) and `stop` is
/// observed within one tick. A failed fetch for one symbol is logged and
/// never aborts the tick or the loop.
pub struct TickerPoller {
    gateway: Arc<dyn ExchangeGateway>,
    prices: Arc<PriceMap>,
    sink: Arc<LogSink>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl TickerPoller {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, prices: Arc<PriceMap>, sink: Arc<LogSink>) -> Self {
        Self {
            gateway,
            prices,
            sink,
            stop_tx: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub fn start(&self, interval_secs: u64) {
        let mut slot = self.stop_tx.lock().unwrap();
        if let Some(tx) = slot.as_ref() {
            if !tx.is_closed() {
                info!("ticker poller already running");
                return;
            }
        }

        let (tx, mut rx) = watch::channel(false);
        *slot = Some(tx);

        let gateway = Arc::clone(&self.gateway);
        let prices = Arc::clone(&self.prices);
        let sink = Arc::clone(&self.sink);

        sink.push(format!("price polling started ({interval_secs}s interval)"));
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            // A slow round must not be followed by a burst of catch-up ticks.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => poll_once(&*gateway, &prices, &sink).await,
                }
            }
            info!("ticker poller stopped");
        });
    }

    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().unwrap().take() {
            let _ = tx.send(true);
            self.sink.push("price polling stopped");
        }
    }
}

async fn poll_once(gateway: &dyn ExchangeGateway, prices: &PriceMap, sink: &LogSink) {
    let symbols: Vec<Symbol> = {
        let map = prices.read().unwrap();
        if map.is_empty() {
            DEFAULT_SYMBOLS
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect()
        } else {
            map.keys().cloned().collect()
        }
    };

    for symbol in symbols {
        match gateway.fetch_ticker(&symbol).await {
            Ok(Some(price)) => {
                prices.write().unwrap().insert(symbol, price);
            }
            Ok(None) => {
                warn!("no price for {symbol}");
            }
            Err(e) => {
                warn!("ticker fetch failed for {symbol}: {e}");
                sink.push(format!("ticker fetch failed for {symbol}: {e}"));
            }
        }
    }
}
