// src/connectors/mod.rs
pub mod binance;
pub mod traits;
