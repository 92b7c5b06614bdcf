//! Aggregation of per-symbol valuations into a portfolio result.

use crate::core::error::CalculationError;
use crate::core::valuation::{SymbolOutcome, Valuation};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioResult {
    pub start_value: f64,
    pub end_value: f64,
    pub growth_percent: f64,
    pub missing_symbols: Vec<String>,
    pub trace: Vec<String>,
}

/// Combines valuations, given in allocation order, into totals.
///
/// Skipped symbols contribute nothing to the totals and are listed once each
/// in `missing_symbols`. A zero base or a non-finite total (NaN, or an
/// overflow to infinity) is a computation error.
pub fn aggregate(valuations: Vec<Valuation>) -> Result<PortfolioResult, CalculationError> {
    let mut start_value = 0.0;
    let mut end_value = 0.0;
    let mut missing_symbols: Vec<String> = Vec::new();
    let mut trace = Vec::new();

    for valuation in valuations {
        match &valuation.outcome {
            SymbolOutcome::Valued(v) => {
                start_value += v.start_value;
                end_value += v.end_value;
            }
            SymbolOutcome::Skipped { symbol, .. } => {
                if !missing_symbols.contains(symbol) {
                    missing_symbols.push(symbol.clone());
                }
            }
        }
        trace.extend(valuation.trace);
    }

    if start_value == 0.0 || !start_value.is_finite() || !end_value.is_finite() {
        return Err(CalculationError::Computation { trace });
    }

    let growth_percent = (end_value - start_value) / start_value * 100.0;

    Ok(PortfolioResult {
        start_value,
        end_value,
        growth_percent,
        missing_symbols,
        trace,
    })
}
