//! Core business logic: request validation, valuation and aggregation

pub mod aggregate;
pub mod allocation;
pub mod calculator;
pub mod config;
pub mod error;
pub mod log;
pub mod price;
pub mod recorder;
pub mod valuation;

// Re-export main types for cleaner imports
pub use aggregate::PortfolioResult;
pub use allocation::{Allocation, PortfolioRequest};
pub use calculator::PortfolioCalculator;
pub use error::{CalculationError, ValidationError};
pub use price::{Interval, PriceObservation, PriceSeriesProvider};
pub use recorder::{NoopRecorder, Recorder, TracingRecorder};
