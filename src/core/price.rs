//! Price series abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Sampling granularity of a historical price series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Interval::Daily => "1d",
                Interval::Weekly => "1wk",
                Interval::Monthly => "1mo",
            }
        )
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1d" | "daily" => Ok(Interval::Daily),
            "1wk" | "weekly" => Ok(Interval::Weekly),
            "1mo" | "monthly" => Ok(Interval::Monthly),
            _ => Err(anyhow::anyhow!("Invalid interval: {}", s)),
        }
    }
}

/// One point of a historical series. `adjusted_close` is `None` when the
/// provider reported no value for that bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub adjusted_close: Option<f64>,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, adjusted_close: f64) -> Self {
        Self {
            date,
            adjusted_close: Some(adjusted_close),
        }
    }
}

/// Source of historical adjusted-close prices.
///
/// Implementations return observations ordered by date. An empty series is
/// not an error at this level; callers decide whether it is usable.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<PriceObservation>>;
}
