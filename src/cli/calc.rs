use super::ui;
use crate::core::valuation::{SymbolOutcome, Valuation};
use crate::core::{PortfolioCalculator, PortfolioRequest, PortfolioResult, Recorder};
use anyhow::{Context, Result};
use comfy_table::Cell;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Drives a progress bar and keeps every valuation for the summary table.
struct ProgressRecorder {
    pb: ProgressBar,
    valuations: Mutex<Vec<Valuation>>,
}

impl ProgressRecorder {
    fn new(len: usize) -> Self {
        Self {
            pb: ui::new_progress_bar(len as u64),
            valuations: Mutex::new(Vec::with_capacity(len)),
        }
    }

    fn into_valuations(self) -> Vec<Valuation> {
        self.valuations
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Recorder for ProgressRecorder {
    fn symbol_started(&self, symbol: &str) {
        self.pb.set_message(format!("Fetching {symbol}"));
    }

    fn symbol_finished(&self, valuation: &Valuation) {
        self.valuations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(valuation.clone());
        self.pb.inc(1);
    }

    fn calculation_finished(&self, elapsed: Duration) {
        self.pb.finish_and_clear();
        debug!("Stock data and calculation took {:?}", elapsed);
    }
}

/// Reads a request file in the HTTP body format, calculates it and prints a
/// per-symbol table with the totals.
pub async fn run(calculator: &PortfolioCalculator, request_path: &Path) -> Result<()> {
    let body = std::fs::read(request_path)
        .with_context(|| format!("Failed to read request file: {}", request_path.display()))?;
    let request = PortfolioRequest::from_json_slice(&body)
        .with_context(|| format!("Invalid request in {}", request_path.display()))?;

    let recorder = ProgressRecorder::new(request.allocations.len());
    let result = calculator.calculate(&request, &recorder).await;
    let valuations = recorder.into_valuations();

    match result {
        Ok(result) => {
            println!("{}", display_as_table(&request, valuations, &result));
            Ok(())
        }
        Err(e) => {
            for line in e.trace() {
                eprintln!("{}", ui::style_text(line, ui::StyleType::Subtle));
            }
            Err(e.into())
        }
    }
}

/// Renders one row per allocation, in request order, followed by the totals.
pub fn display_as_table(
    request: &PortfolioRequest,
    mut valuations: Vec<Valuation>,
    result: &PortfolioResult,
) -> String {
    valuations.sort_by_key(|v| v.index);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Weight (%)"),
        ui::header_cell("Start Price"),
        ui::header_cell("End Price"),
        ui::header_cell("Start Value"),
        ui::header_cell("End Value"),
        ui::header_cell("Change"),
    ]);

    for valuation in &valuations {
        let weight = request.allocations.get(valuation.index).map(|a| a.percentage);
        let weight = ui::format_optional_cell(weight, |w| format!("{w:.2}%"));

        match &valuation.outcome {
            SymbolOutcome::Valued(v) => {
                table.add_row(vec![
                    Cell::new(&v.symbol),
                    weight,
                    ui::format_optional_cell(Some(v.start_price), |p| format!("{p:.2}")),
                    ui::format_optional_cell(Some(v.end_price), |p| format!("{p:.2}")),
                    ui::format_optional_cell(Some(v.start_value), |p| format!("{p:.2}")),
                    ui::format_optional_cell(Some(v.end_value), |p| format!("{p:.2}")),
                    ui::change_cell((v.end_price - v.start_price) / v.start_price * 100.0),
                ]);
            }
            SymbolOutcome::Skipped { symbol, reason } => {
                table.add_row(vec![
                    Cell::new(symbol),
                    weight,
                    Cell::new(ui::style_text(reason, ui::StyleType::Error)),
                ]);
            }
        }
    }

    let mut output = format!(
        "Portfolio: {} to {}\n\n",
        ui::style_text(&request.start_date.to_string(), ui::StyleType::Title),
        ui::style_text(&request.end_date.to_string(), ui::StyleType::Title)
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{} {}\n{} {}\n{} {}",
        ui::style_text("Start Value:", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", result.start_value), ui::StyleType::TotalValue),
        ui::style_text("End Value:", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}", result.end_value), ui::StyleType::TotalValue),
        ui::style_text("Growth:", ui::StyleType::TotalLabel),
        ui::style_text(&format!("{:.2}%", result.growth_percent), ui::StyleType::TotalValue),
    ));
    if !result.missing_symbols.is_empty() {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!("Missing data: {}", result.missing_symbols.join(", ")),
                ui::StyleType::Error
            )
        ));
    }

    output
}
