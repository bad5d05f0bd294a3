// src/error.rs
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures at the exchange boundary. `Rejected` carries the exchange's own
/// message so it can be surfaced verbatim in per-asset outcomes.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("trading attempted without credentials")]
    Unauthenticated,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange rejected request: {0}")]
    Rejected(String),

    #[error("malformed exchange response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Connectivity or auth failure in a prerequisite step. Fatal for the
    /// current operation only.
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(#[source] GatewayError),

    /// Market metadata refresh failed; the previous catalog stays in place.
    #[error("market catalog unavailable: {0}")]
    CatalogUnavailable(#[source] GatewayError),

    #[error("{asset}: free balance {free} is at or below the withdrawal minimum {min}")]
    BelowMinimum {
        asset: String,
        free: Decimal,
        min: Decimal,
    },

    /// `liquidate_to_quote` is not reentrant; the caller must serialize passes.
    #[error("a liquidation pass is already in flight")]
    PassInFlight,
}
