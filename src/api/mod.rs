//! HTTP surface: a single `POST /api/calculate-portfolio` endpoint.

mod error;
mod response;

pub use error::{ApiError, handle_panic};
pub use response::PortfolioResponse;

use crate::core::{PortfolioCalculator, PortfolioRequest, TracingRecorder};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::Method,
    routing::any,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub const CALCULATE_PORTFOLIO_PATH: &str = "/api/calculate-portfolio";

#[derive(Clone)]
pub struct AppState {
    pub calculator: Arc<PortfolioCalculator>,
}

pub fn router(calculator: Arc<PortfolioCalculator>) -> Router {
    Router::new()
        .route(CALCULATE_PORTFOLIO_PATH, any(calculate_portfolio))
        .with_state(AppState { calculator })
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

async fn calculate_portfolio(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<PortfolioResponse>, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed(method));
    }

    let request = PortfolioRequest::from_json_slice(&body).inspect_err(|e| {
        warn!(error = %e, "Rejected portfolio request");
    })?;
    info!(
        allocations = request.allocations.len(),
        start = %request.start_date,
        end = %request.end_date,
        "Calculating portfolio growth"
    );

    let result = state
        .calculator
        .calculate(&request, &TracingRecorder)
        .await
        .inspect_err(|e| error!(error = %e, "Portfolio calculation failed"))?;

    Ok(Json(PortfolioResponse::from(result)))
}
