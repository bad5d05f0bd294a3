// src/core/withdraw.rs
use crate::connectors::traits::ExchangeGateway;
use crate::core::gate::SafetyGate;
use crate::core::logsink::LogSink;
use crate::error::EngineError;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WithdrawalOutcome {
    /// Trading disabled; the request was logged but never submitted.
    Simulated(Decimal),
    Withdrawn(Decimal),
}

/// Withdraws the full free balance of an asset over a named network.
/// Network support varies per exchange; an unsupported network surfaces as
/// an ordinary gateway failure, never a crash.
pub struct WithdrawalManager {
    gateway: Arc<dyn ExchangeGateway>,
    gate: Arc<SafetyGate>,
    sink: Arc<LogSink>,
}

impl WithdrawalManager {
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

    pub async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        network: &str,
        min_amount: Decimal,
    ) -> Result<WithdrawalOutcome, EngineError> {
        let balances = self
            .gateway
            .fetch_balances()
            .await
            .map_err(EngineError::GatewayUnavailable)?;
        let free = balances
            .get(asset)
            .map(|bal| bal.free)
            .unwrap_or(Decimal::ZERO);

        if free <= min_amount {
            self.sink.push(format!(
                "withdrawal refused: {asset} free balance {free} at or below minimum {min_amount}"
            ));
            return Err(EngineError::BelowMinimum {
                asset: asset.to_string(),
                free,
                min: min_amount,
            });
        }

        self.sink.push(format!(
            "withdrawal request: {free} {asset} to {address} via {network}"
        ));

        if !self.gate.is_live() {
            self.sink
                .push(format!("(simulated) withdrawal of {free} {asset} not submitted"));
            return Ok(WithdrawalOutcome::Simulated(free));
        }

        match self.gateway.withdraw(asset, free, address, network).await {
            Ok(receipt) => {
                info!("withdrawal accepted: {} {asset} (tx {})", free, receipt.id);
                self.sink
                    .push(format!("withdrawal accepted: {free} {asset} (tx {})", receipt.id));
                Ok(WithdrawalOutcome::Withdrawn(free))
            }
            Err(e) => {
                self.sink.push(format!("withdrawal failed for {asset}: {e}"));
                Err(EngineError::GatewayUnavailable(e))
            }
        }
    }
}
