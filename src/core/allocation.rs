//! Allocation requests and their validation.

use crate::core::error::ValidationError;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A share of the total investment placed in one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub symbol: String,
    pub percentage: f64,
}

/// A validated portfolio request.
///
/// Percentages are deliberately not required to sum to 100 and the dates are
/// not required to be ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRequest {
    pub allocations: Vec<Allocation>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub investment_amount: f64,
}

impl PortfolioRequest {
    /// Parses a raw JSON body and validates it.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validates a request candidate, reporting the first violated
    /// precondition: stocks, then dates, then investment amount.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let body = value
            .as_object()
            .ok_or_else(|| ValidationError::MalformedBody("expected an object".to_string()))?;

        let allocations = parse_allocations(body.get("stocks"))?;

        let (start, end) = match (non_null(body, "startDate"), non_null(body, "endDate")) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(ValidationError::MissingDates),
        };
        let start_date = parse_date("startDate", start)?;
        let end_date = parse_date("endDate", end)?;

        let investment_amount = non_null(body, "investmentAmount")
            .and_then(as_number)
            .filter(|amount| amount.is_finite() && *amount > 0.0)
            .ok_or(ValidationError::InvalidInvestmentAmount)?;

        Ok(PortfolioRequest {
            allocations,
            start_date,
            end_date,
            investment_amount,
        })
    }
}

fn non_null<'a>(body: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    body.get(key).filter(|v| !v.is_null())
}

fn parse_allocations(value: Option<&Value>) -> Result<Vec<Allocation>, ValidationError> {
    let entries = match value.and_then(Value::as_array) {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(ValidationError::MissingAllocations),
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_allocation(index, entry))
        .collect()
}

fn parse_allocation(index: usize, entry: &Value) -> Result<Allocation, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidAllocation {
        index,
        reason: reason.to_string(),
    };

    let symbol = entry
        .get("symbol")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("symbol must be a non-empty string"))?;

    let percentage = entry
        .get("percentage")
        .and_then(as_number)
        .ok_or_else(|| invalid("percentage must be a number"))?;
    if !(percentage > 0.0 && percentage <= 100.0) {
        return Err(invalid("percentage must be greater than 0 and at most 100"));
    }

    Ok(Allocation { symbol, percentage })
}

/// Accepts JSON numbers and numeric strings, as web forms often send the latter.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_date(field: &'static str, value: &Value) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
    };

    let text = value.as_str().map(str::trim).ok_or_else(invalid)?;
    if text.is_empty() {
        return Err(ValidationError::MissingDates);
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()))
        .map_err(|_| invalid())
}
