use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::util::with_retry;
use crate::core::config::YahooProviderConfig;
use crate::core::price::{Interval, PriceObservation, PriceSeriesProvider};

/// Marks failures worth another attempt: transport errors and 5xx responses.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Transient(String);

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

// YahooFinanceProvider implementation for PriceSeriesProvider
pub struct YahooFinanceProvider {
    base_url: Url,
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl YahooFinanceProvider {
    pub fn new(config: &YahooProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("growfolio/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid Yahoo base URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Invalid Yahoo base URL: {}", config.base_url));
        }
        Ok(YahooFinanceProvider {
            base_url,
            client,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Chart endpoint for `symbol`. The symbol is percent-encoded as a single
    /// path segment, so `#`, `?` and `/` cannot alter the request.
    fn chart_url(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid Yahoo base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("period1", &unix_midnight(start).to_string())
            .append_pair("period2", &unix_midnight(end).to_string())
            .append_pair("interval", &interval.to_string())
            .append_pair("events", "history");
        Ok(url)
    }

    async fn get_chart(&self, url: &Url, symbol: &str) -> Result<(StatusCode, String)> {
        let client = &self.client;
        with_retry(
            || async move {
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| Transient(format!("Request error: {e} for symbol: {symbol}")))?;
                let status = response.status();
                if status.is_server_error() {
                    return Err(Transient(format!("HTTP error: {status} for symbol: {symbol}")).into());
                }
                let text = response
                    .text()
                    .await
                    .map_err(|e| Transient(format!("Read error: {e} for symbol: {symbol}")))?;
                Ok::<_, anyhow::Error>((status, text))
            },
            self.retries,
            self.retry_delay_ms,
            |e| e.is::<Transient>(),
        )
        .await
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Deserialize, Debug)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

fn describe(error: &ChartError, symbol: &str) -> String {
    match (&error.description, &error.code) {
        (Some(description), _) => format!("{description} (symbol: {symbol})"),
        (None, Some(code)) => format!("{code} (symbol: {symbol})"),
        (None, None) => format!("Unknown error for symbol: {symbol}"),
    }
}

fn extract_observations(item: &ChartItem) -> Vec<PriceObservation> {
    let Some(timestamps) = item.timestamp.as_ref() else {
        return Vec::new();
    };
    let closes = item
        .indicators
        .as_ref()
        .and_then(|inds| inds.adjclose.as_ref())
        .and_then(|series| series.first())
        .and_then(|s| s.adjclose.as_ref());

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            let adjusted_close = closes.and_then(|c| c.get(i).copied().flatten());
            Some(PriceObservation {
                date,
                adjusted_close,
            })
        })
        .collect()
}

#[async_trait]
impl PriceSeriesProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooSeriesFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<PriceObservation>> {
        let url = self.chart_url(symbol, start, end, interval)?;
        debug!("Requesting price series from {}", url);

        let (status, text) = self.get_chart(&url, symbol).await?;
        let parsed = serde_json::from_str::<YahooChartResponse>(&text);

        if !status.is_success() {
            return Err(match parsed.ok().and_then(|r| r.chart.error) {
                Some(error) => anyhow!(describe(&error, symbol)),
                None => anyhow!("HTTP error: {} for symbol: {}", status, symbol),
            });
        }

        let data =
            parsed.map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;
        if let Some(error) = data.chart.error {
            return Err(anyhow!(describe(&error, symbol)));
        }

        let item = data
            .chart
            .result
            .as_ref()
            .and_then(|items| items.first())
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        let observations = extract_observations(item);
        debug!(count = observations.len(), "Received price series");
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JAN_2022: i64 = 1640995200;
    const JUN_2022: i64 = 1654041600;
    const DEC_2022: i64 = 1669852800;

    fn provider(server: &MockServer, retries: usize) -> YahooFinanceProvider {
        YahooFinanceProvider::new(&YahooProviderConfig {
            base_url: server.uri(),
            retries,
            retry_delay_ms: 10,
        })
        .unwrap()
    }

    fn window() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        )
    }

    fn chart_body(timestamps: &str, adjclose: &str) -> String {
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "currency": "USD", "symbol": "AAPL" }},
                        "timestamp": [{timestamps}],
                        "indicators": {{
                            "quote": [{{ "close": [1.0, 2.0, 3.0] }}],
                            "adjclose": [{{ "adjclose": [{adjclose}] }}]
                        }}
                    }}],
                    "error": null
                }}
            }}"#
        )
    }

    #[tokio::test]
    async fn test_successful_series_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("period1", "1640995200"))
            .and(query_param("period2", "1672531200"))
            .and(query_param("interval", "1mo"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chart_body(
                &format!("{JAN_2022}, {JUN_2022}, {DEC_2022}"),
                "100.5, null, 120.25",
            )))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let series = provider(&mock_server, 0)
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, start);
        assert_eq!(series[0].adjusted_close, Some(100.5));
        assert_eq!(series[1].adjusted_close, None);
        assert_eq!(series[2].date, NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        assert_eq!(series[2].adjusted_close, Some(120.25));
    }

    #[tokio::test]
    async fn test_missing_adjclose_yields_empty_prices() {
        let mock_server = MockServer::start().await;
        let body = format!(
            r#"{{"chart": {{"result": [{{"timestamp": [{JAN_2022}, {DEC_2022}],
                "indicators": {{"quote": [{{"close": [1.0, 2.0]}}]}}}}], "error": null}}}}"#
        );
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let series = provider(&mock_server, 0)
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|o| o.adjusted_close.is_none()));
    }

    #[tokio::test]
    async fn test_result_without_timestamps_is_empty_series() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"chart": {"result": [{"meta": {}, "indicators": {"quote": [{}]}}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let series = provider(&mock_server, 0)
            .fetch_series("AAPL", end, start, Interval::Monthly)
            .await
            .unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_no_price_result_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/INVALID"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"chart": {"result": []}}"#))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let result = provider(&mock_server, 0)
            .fetch_series("INVALID", start, end, Interval::Monthly)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_not_found_surfaces_yahoo_description() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BADSYM"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"chart": {"result": null, "error": {"code": "Not Found",
                    "description": "No data found, symbol may be delisted"}}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let result = provider(&mock_server, 3)
            .fetch_series("BADSYM", start, end, Interval::Monthly)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No data found, symbol may be delisted (symbol: BADSYM)"
        );
    }

    #[tokio::test]
    async fn test_symbol_is_encoded_as_one_path_segment() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chart_body(
                &format!("{JAN_2022}, {DEC_2022}"),
                "100.0, 120.0",
            )))
            .expect(0)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL%23BOGUS"))
            .and(query_param("interval", "1mo"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"chart": {"result": null, "error": {"code": "Not Found",
                    "description": "No data found, symbol may be delisted"}}}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let provider = provider(&mock_server, 0);
        let result = provider
            .fetch_series("AAPL#BOGUS", start, end, Interval::Monthly)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No data found, symbol may be delisted (symbol: AAPL#BOGUS)"
        );

        for symbol in ["AAPL?interval=1d", "AAPL/../MSFT"] {
            let result = provider
                .fetch_series(symbol, start, end, Interval::Monthly)
                .await;
            assert!(result.is_err(), "{symbol} should not resolve to AAPL");
        }

        for request in mock_server.received_requests().await.unwrap() {
            assert_eq!(request.url.path_segments().unwrap().count(), 4);
            let intervals: Vec<_> = request
                .url
                .query_pairs()
                .filter(|(key, _)| key == "interval")
                .map(|(_, value)| value.into_owned())
                .collect();
            assert_eq!(intervals, vec!["1mo"]);
        }
    }

    #[tokio::test]
    async fn test_base_url_with_trailing_slash() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chart_body(
                &format!("{JAN_2022}, {DEC_2022}"),
                "100.0, 120.0",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&YahooProviderConfig {
            base_url: format!("{}/", mock_server.uri()),
            retries: 0,
            retry_delay_ms: 10,
        })
        .unwrap();
        let (start, end) = window();
        let series = provider
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = YahooFinanceProvider::new(&YahooProviderConfig {
            base_url: "not a url".to_string(),
            retries: 0,
            retry_delay_ms: 10,
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(chart_body(
                &format!("{JAN_2022}, {DEC_2022}"),
                "10.0, 11.0",
            )))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let series = provider(&mock_server, 1)
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_after_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let result = provider(&mock_server, 1)
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: AAPL"
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"charts": {}}"#))
            .mount(&mock_server)
            .await;

        let (start, end) = window();
        let result = provider(&mock_server, 0)
            .fetch_series("AAPL", start, end, Interval::Monthly)
            .await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for AAPL")
        );
    }
}
