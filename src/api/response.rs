use crate::core::PortfolioResult;
use serde::{Deserialize, Serialize};

/// Wire shape of a successful calculation. Amounts are fixed two-decimal
/// strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub start_value: String,
    pub end_value: String,
    pub growth: String,
    pub missing_stocks: Option<String>,
    pub debug: Vec<String>,
}

impl From<PortfolioResult> for PortfolioResponse {
    fn from(result: PortfolioResult) -> Self {
        let missing_stocks = (!result.missing_symbols.is_empty())
            .then(|| format!("Missing data: {}", result.missing_symbols.join(", ")));

        PortfolioResponse {
            start_value: format!("{:.2}", result.start_value),
            end_value: format!("{:.2}", result.end_value),
            growth: format!("{:.2}", result.growth_percent),
            missing_stocks,
            debug: result.trace,
        }
    }
}
