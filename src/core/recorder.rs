//! Observability hook for the calculator.

use crate::core::valuation::{SymbolOutcome, Valuation};
use std::time::Duration;
use tracing::{info, warn};

/// Receives progress events while a portfolio is being calculated.
///
/// Calls for different symbols may arrive concurrently and in any order.
pub trait Recorder: Send + Sync {
    fn symbol_started(&self, _symbol: &str) {}
    fn symbol_finished(&self, _valuation: &Valuation) {}
    fn calculation_finished(&self, _elapsed: Duration) {}
}

/// Discards every event.
pub struct NoopRecorder;

impl Recorder for NoopRecorder {}

/// Forwards events to `tracing`.
pub struct TracingRecorder;

impl Recorder for TracingRecorder {
    fn symbol_started(&self, symbol: &str) {
        info!(%symbol, "Fetching price series");
    }

    fn symbol_finished(&self, valuation: &Valuation) {
        let index = valuation.index;
        match &valuation.outcome {
            SymbolOutcome::Valued(v) => info!(
                index,
                symbol = %v.symbol,
                start_value = v.start_value,
                end_value = v.end_value,
                "Symbol valued"
            ),
            SymbolOutcome::Skipped { symbol, reason } => {
                warn!(index, %symbol, %reason, "Symbol skipped")
            }
        }
    }

    fn calculation_finished(&self, elapsed: Duration) {
        info!(elapsed_ms = elapsed.as_millis() as u64, "Stock data and calculation finished");
    }
}
