//! Error types surfaced by the growth calculator.

use std::any::Any;
use thiserror::Error;

/// A request that failed validation. The message of the first violated
/// precondition is what callers see.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object: {0}")]
    MalformedBody(String),

    #[error("Stocks array is missing or empty.")]
    MissingAllocations,

    #[error("Invalid stock entry at position {index}: {reason}")]
    InvalidAllocation { index: usize, reason: String },

    #[error("Start and End date are required.")]
    MissingDates,

    #[error("Invalid {field}: '{value}' is not a valid date.")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid investment amount.")]
    InvalidInvestmentAmount,
}

/// Failures that abort a whole calculation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalculationError {
    /// Every allocation was skipped, or the surviving ones sum to a zero or
    /// non-finite value. Carries the trace gathered so far.
    #[error("Portfolio value calculation failed, possible missing stock data.")]
    Computation { trace: Vec<String> },
}

impl CalculationError {
    /// Diagnostic lines collected before the failure.
    pub fn trace(&self) -> &[String] {
        match self {
            CalculationError::Computation { trace } => trace,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
