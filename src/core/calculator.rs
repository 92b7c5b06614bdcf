//! Portfolio growth calculation: validate, fetch and value every allocation
//! concurrently, then aggregate.

use crate::core::aggregate::{PortfolioResult, aggregate};
use crate::core::allocation::PortfolioRequest;
use crate::core::config::CalculatorConfig;
use crate::core::error::{CalculationError, panic_message};
use crate::core::price::{Interval, PriceSeriesProvider};
use crate::core::recorder::Recorder;
use crate::core::valuation::{FetchWindow, fetch_and_value, value_allocation};
use anyhow::anyhow;
use futures::FutureExt;
use futures::future::join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

pub struct PortfolioCalculator {
    provider: Arc<dyn PriceSeriesProvider>,
    interval: Interval,
    request_timeout: Duration,
}

impl PortfolioCalculator {
    pub fn new(provider: Arc<dyn PriceSeriesProvider>, config: &CalculatorConfig) -> Self {
        Self {
            provider,
            interval: config.interval,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Computes the growth of `request`. Per-symbol failures are recorded in
    /// the result; only a degenerate aggregate fails the call.
    #[instrument(
        name = "PortfolioCalculation",
        skip_all,
        fields(allocations = request.allocations.len())
    )]
    pub async fn calculate(
        &self,
        request: &PortfolioRequest,
        recorder: &dyn Recorder,
    ) -> Result<PortfolioResult, CalculationError> {
        let started = Instant::now();
        let window = FetchWindow {
            start: request.start_date,
            end: request.end_date,
            interval: self.interval,
            timeout: self.request_timeout,
        };
        debug!(?window, amount = request.investment_amount, "Starting calculation");

        let futures = request
            .allocations
            .iter()
            .enumerate()
            .map(|(index, allocation)| async move {
                recorder.symbol_started(&allocation.symbol);
                let fetch = fetch_and_value(
                    self.provider.as_ref(),
                    index,
                    allocation,
                    request.investment_amount,
                    window,
                );
                // A panicking provider only loses its own symbol.
                let valuation = AssertUnwindSafe(fetch)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let reason = anyhow!("Price fetch panicked: {}", panic_message(&*panic));
                        value_allocation(index, allocation, request.investment_amount, Err(reason))
                    });
                recorder.symbol_finished(&valuation);
                valuation
            });

        // join_all keeps allocation order, which fixes the trace order.
        let valuations = join_all(futures).await;
        recorder.calculation_finished(started.elapsed());

        aggregate(valuations)
    }
}
