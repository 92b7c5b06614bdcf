//! Per-symbol valuation: one allocation plus its price series becomes a start
//! and end value, or a skipped symbol with a reason.

use crate::core::allocation::Allocation;
use crate::core::price::{Interval, PriceObservation, PriceSeriesProvider};
use anyhow::Result;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolValue {
    pub symbol: String,
    pub start_price: f64,
    pub end_price: f64,
    pub shares: f64,
    pub start_value: f64,
    pub end_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Valued(SymbolValue),
    Skipped { symbol: String, reason: String },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Valued(v) => &v.symbol,
            SymbolOutcome::Skipped { symbol, .. } => symbol,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SymbolOutcome::Skipped { .. })
    }
}

/// Outcome of one symbol plus the diagnostic lines it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    /// Position of the allocation in the request; duplicate symbols differ here.
    pub index: usize,
    pub outcome: SymbolOutcome,
    pub trace: Vec<String>,
}

/// Everything needed to fetch one symbol's series.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
    pub timeout: Duration,
}

fn usable_price(observation: Option<&PriceObservation>) -> Option<f64> {
    observation
        .and_then(|o| o.adjusted_close)
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Values an allocation against the result of fetching its series.
///
/// Only the first and last observations are consumed.
pub fn value_allocation(
    index: usize,
    allocation: &Allocation,
    total_investment: f64,
    series: Result<Vec<PriceObservation>>,
) -> Valuation {
    let symbol = allocation.symbol.clone();
    let mut trace = vec![format!("Fetching data for {symbol}")];

    let skip = |mut trace: Vec<String>, line: String, reason: String| {
        trace.push(line);
        Valuation {
            index,
            outcome: SymbolOutcome::Skipped {
                symbol: allocation.symbol.clone(),
                reason,
            },
            trace,
        }
    };

    let series = match series {
        Ok(series) => series,
        Err(e) => {
            let reason = e.to_string();
            return skip(trace, format!("Error fetching {symbol}: {reason}"), reason);
        }
    };

    if series.len() < 2 {
        return skip(
            trace,
            format!("No valid data for {symbol}"),
            format!("fewer than two price points ({})", series.len()),
        );
    }

    let (start_price, end_price) = match (usable_price(series.first()), usable_price(series.last()))
    {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return skip(
                trace,
                format!("Skipping {symbol} due to invalid price data"),
                "missing or invalid start/end price".to_string(),
            );
        }
    };

    let investment = total_investment * (allocation.percentage / 100.0);
    let shares = investment / start_price;
    let start_value = shares * start_price;
    let end_value = shares * end_price;

    debug!(%symbol, investment, shares, start_value, end_value, "Valued allocation");
    trace.push(format!("{symbol} | Start: ${start_price} | End: ${end_price}"));

    Valuation {
        index,
        outcome: SymbolOutcome::Valued(SymbolValue {
            symbol,
            start_price,
            end_price,
            shares,
            start_value,
            end_value,
        }),
        trace,
    }
}

/// Fetches the series for one allocation under a timeout and values it.
/// Never fails: provider errors and timeouts become skipped outcomes.
pub async fn fetch_and_value(
    provider: &dyn PriceSeriesProvider,
    index: usize,
    allocation: &Allocation,
    total_investment: f64,
    window: FetchWindow,
) -> Valuation {
    let fetch = provider.fetch_series(&allocation.symbol, window.start, window.end, window.interval);
    let series = match tokio::time::timeout(window.timeout, fetch).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "Timed out after {}ms waiting for {}",
            window.timeout.as_millis(),
            allocation.symbol
        )),
    };

    value_allocation(index, allocation, total_investment, series)
}
