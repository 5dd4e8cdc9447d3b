use async_trait::async_trait;
use reqwest::Client;
use screener_core::{parse_metric_value, FundamentalsProvider, FundamentalsRecord, Metric, ScreenerError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::rate_limiter::RateLimiter;

const BASE_URL: &str = "https://www.alphavantage.co";

/// Alpha Vantage fundamentals: `OVERVIEW` for valuation and profitability,
/// `BALANCE_SHEET` for leverage and liquidity, `CASH_FLOW` for free cash flow.
#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: Option<RateLimiter>,
}

#[derive(Debug, Default, Deserialize)]
struct CompanyOverview {
    #[serde(rename = "Symbol", default)]
    symbol: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "DividendYield", default)]
    dividend_yield: Option<String>,
    #[serde(rename = "DividendPerShare", default)]
    dividend_per_share: Option<String>,
    #[serde(rename = "EPS", default)]
    eps: Option<String>,
    #[serde(rename = "QuarterlyRevenueGrowthYOY", default)]
    revenue_growth: Option<String>,
    #[serde(rename = "TrailingPE", default)]
    trailing_pe: Option<String>,
    #[serde(rename = "PERatio", default)]
    pe_ratio: Option<String>,
    #[serde(rename = "ReturnOnEquityTTM", default)]
    roe: Option<String>,
    #[serde(rename = "GrossProfitTTM", default)]
    gross_profit: Option<String>,
    #[serde(rename = "RevenueTTM", default)]
    revenue: Option<String>,
    #[serde(rename = "OperatingMarginTTM", default)]
    operating_margin: Option<String>,
    #[serde(rename = "PEGRatio", default)]
    peg_ratio: Option<String>,
    #[serde(rename = "EVToEBITDA", default)]
    ev_to_ebitda: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResponse {
    #[serde(rename = "annualReports", default)]
    annual_reports: Vec<Map<String, Value>>,
    #[serde(rename = "quarterlyReports", default)]
    quarterly_reports: Vec<Map<String, Value>>,
}

fn opt(raw: &Option<String>) -> Option<f64> {
    raw.as_deref().and_then(parse_metric_value)
}

fn field(report: &Map<String, Value>, key: &str) -> Option<f64> {
    match report.get(key)? {
        Value::String(s) => parse_metric_value(s),
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

/// Map the three Alpha Vantage payloads onto a fundamentals record.
/// Anything the payloads lack stays absent.
fn build_record(
    ticker: &str,
    overview: &CompanyOverview,
    balance_sheet: Option<&Map<String, Value>>,
    cash_flow: Option<&Map<String, Value>>,
) -> FundamentalsRecord {
    let mut record = FundamentalsRecord::new(overview.symbol.clone().unwrap_or_else(|| ticker.to_string()));
    record.name = overview.name.clone().filter(|n| !n.trim().is_empty());

    record.set(Metric::DividendYield, opt(&overview.dividend_yield));
    record.set(
        Metric::PayoutRatio,
        ratio(opt(&overview.dividend_per_share), opt(&overview.eps)),
    );
    record.set(Metric::RevenueGrowth, opt(&overview.revenue_growth));
    record.set(
        Metric::TrailingPe,
        opt(&overview.trailing_pe).or_else(|| opt(&overview.pe_ratio)),
    );
    record.set(Metric::ReturnOnEquity, opt(&overview.roe));
    record.set(
        Metric::GrossMargin,
        ratio(opt(&overview.gross_profit), opt(&overview.revenue)),
    );
    record.set(Metric::OperatingMargin, opt(&overview.operating_margin));
    record.set(Metric::PegRatio, opt(&overview.peg_ratio));
    record.set(Metric::EvToEbitda, opt(&overview.ev_to_ebitda));

    if let Some(bs) = balance_sheet {
        let total_debt = field(bs, "shortLongTermDebtTotal").or_else(|| {
            match (field(bs, "shortTermDebt"), field(bs, "longTermDebt")) {
                (None, None) => None,
                (short, long) => Some(short.unwrap_or(0.0) + long.unwrap_or(0.0)),
            }
        });
        record.set(
            Metric::DebtToEquity,
            ratio(total_debt, field(bs, "totalShareholderEquity")),
        );
        record.set(
            Metric::CurrentRatio,
            ratio(field(bs, "totalCurrentAssets"), field(bs, "totalCurrentLiabilities")),
        );
    }

    if let Some(cf) = cash_flow {
        if let (Some(ocf), Some(capex)) = (field(cf, "operatingCashflow"), field(cf, "capitalExpenditures")) {
            // Reported as a positive outflow on most filings, negative on some
            record.set(Metric::FreeCashFlow, Some(ocf - capex.abs()));
        }
    }

    record
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Throttle to `per_minute` requests (the free tier allows 5).
    pub fn with_rate_limit(mut self, per_minute: usize) -> Self {
        self.rate_limiter = Some(RateLimiter::per_minute(per_minute));
        self
    }

    async fn query(&self, function: &str, symbol: &str) -> Result<Value, ScreenerError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("function", function), ("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ScreenerError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScreenerError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ScreenerError::ApiError(e.to_string()))?;

        if let Some(error) = json.get("Error Message") {
            return Err(ScreenerError::ApiError(format!("Alpha Vantage error: {}", error)));
        }
        if let Some(note) = json.get("Note").or_else(|| json.get("Information")) {
            return Err(ScreenerError::ApiError(format!("Alpha Vantage rate limit: {}", note)));
        }

        Ok(json)
    }

    async fn statement(&self, function: &str, symbol: &str) -> Option<StatementResponse> {
        let parsed = self
            .query(function, symbol)
            .await
            .and_then(|json| serde_json::from_value(json).map_err(|e| ScreenerError::ApiError(e.to_string())));

        match parsed {
            Ok(statement) => Some(statement),
            Err(e) => {
                tracing::warn!("{} {} unavailable, dependent metrics left empty: {}", symbol, function, e);
                None
            }
        }
    }

    /// Fetch the overview plus statements and assemble the record.
    pub async fn get_fundamentals(&self, symbol: &str) -> Result<FundamentalsRecord, ScreenerError> {
        let json = self
            .query("OVERVIEW", symbol)
            .await
            .map_err(|e| ScreenerError::unavailable(symbol, e.to_string()))?;

        if json.as_object().map_or(true, |o| o.is_empty()) {
            return Err(ScreenerError::unavailable(symbol, "no overview data returned"));
        }

        let overview: CompanyOverview = serde_json::from_value(json)
            .map_err(|e| ScreenerError::unavailable(symbol, format!("malformed overview: {}", e)))?;

        let balance_sheet = self.statement("BALANCE_SHEET", symbol).await;
        let cash_flow = self.statement("CASH_FLOW", symbol).await;

        let latest_balance = balance_sheet
            .as_ref()
            .and_then(|s| s.quarterly_reports.first().or_else(|| s.annual_reports.first()));
        let latest_cash_flow = cash_flow.as_ref().and_then(|s| s.annual_reports.first());

        let record = build_record(symbol, &overview, latest_balance, latest_cash_flow);
        tracing::debug!(
            "{}: {} of {} metrics available",
            symbol,
            record.available_count(),
            Metric::ALL.len()
        );
        Ok(record)
    }
}

#[async_trait]
impl FundamentalsProvider for AlphaVantageClient {
    async fn fetch(&self, ticker: &str) -> Result<FundamentalsRecord, ScreenerError> {
        self.get_fundamentals(ticker).await
    }

    fn name(&self) -> &str {
        "alpha-vantage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn overview_json() -> Value {
        json!({
            "Symbol": "KO",
            "Name": "Coca-Cola Company",
            "DividendYield": "0.0305",
            "DividendPerShare": "1.94",
            "EPS": "2.47",
            "QuarterlyRevenueGrowthYOY": "0.029",
            "TrailingPE": "25.6",
            "PERatio": "25.9",
            "ReturnOnEquityTTM": "0.406",
            "GrossProfitTTM": "27520000000",
            "RevenueTTM": "45750000000",
            "OperatingMarginTTM": "0.295",
            "PEGRatio": "None",
            "EVToEBITDA": "21.3"
        })
    }

    async fn mount(server: &MockServer, function: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", function))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_build_record_from_overview_only() {
        let overview: CompanyOverview = serde_json::from_value(overview_json()).unwrap();
        let record = build_record("KO", &overview, None, None);

        assert_eq!(record.ticker, "KO");
        assert_eq!(record.name.as_deref(), Some("Coca-Cola Company"));
        assert_eq!(record.get(Metric::DividendYield), Some(0.0305));
        assert_eq!(record.get(Metric::TrailingPe), Some(25.6));
        assert_eq!(record.get(Metric::PegRatio), None);
        assert_eq!(record.get(Metric::DebtToEquity), None);

        let payout = record.get(Metric::PayoutRatio).unwrap();
        assert!((payout - 1.94 / 2.47).abs() < 1e-9);
        let gross = record.get(Metric::GrossMargin).unwrap();
        assert!((gross - 27.52 / 45.75).abs() < 1e-9);
    }

    #[test]
    fn test_build_record_pe_fallback_and_debt_sum() {
        let overview = CompanyOverview {
            pe_ratio: Some("18.0".into()),
            trailing_pe: Some("-".into()),
            ..Default::default()
        };
        let balance = json!({
            "totalCurrentAssets": "300",
            "totalCurrentLiabilities": "200",
            "totalShareholderEquity": "1000",
            "shortLongTermDebtTotal": "None",
            "shortTermDebt": "100",
            "longTermDebt": "400"
        });
        let cash_flow = json!({"operatingCashflow": "900", "capitalExpenditures": "-250"});

        let record = build_record(
            "abc",
            &overview,
            balance.as_object(),
            cash_flow.as_object(),
        );

        assert_eq!(record.ticker, "abc");
        assert_eq!(record.get(Metric::TrailingPe), Some(18.0));
        assert_eq!(record.get(Metric::DebtToEquity), Some(0.5));
        assert_eq!(record.get(Metric::CurrentRatio), Some(1.5));
        assert_eq!(record.get(Metric::FreeCashFlow), Some(650.0));
    }

    #[test]
    fn test_payout_needs_positive_eps() {
        let overview = CompanyOverview {
            dividend_per_share: Some("1.0".into()),
            eps: Some("-0.5".into()),
            ..Default::default()
        };
        let record = build_record("LOSS", &overview, None, None);
        assert_eq!(record.get(Metric::PayoutRatio), None);
    }

    #[tokio::test]
    async fn test_fetch_assembles_all_statements() {
        let server = MockServer::start().await;
        mount(&server, "OVERVIEW", overview_json()).await;
        mount(
            &server,
            "BALANCE_SHEET",
            json!({
                "symbol": "KO",
                "annualReports": [],
                "quarterlyReports": [{
                    "totalCurrentAssets": "26000000000",
                    "totalCurrentLiabilities": "20000000000",
                    "totalShareholderEquity": "26000000000",
                    "shortLongTermDebtTotal": "42900000000"
                }]
            }),
        )
        .await;
        mount(
            &server,
            "CASH_FLOW",
            json!({
                "symbol": "KO",
                "annualReports": [{"operatingCashflow": "11600000000", "capitalExpenditures": "1850000000"}]
            }),
        )
        .await;

        let client = AlphaVantageClient::new("test-key".into()).with_base_url(server.uri());
        let record = client.fetch("KO").await.unwrap();

        assert_eq!(record.get(Metric::CurrentRatio), Some(1.3));
        assert_eq!(record.get(Metric::FreeCashFlow), Some(9_750_000_000.0));
        assert!(record.get(Metric::DebtToEquity).unwrap() > 1.6);
        assert_eq!(client.name(), "alpha-vantage");
    }

    #[tokio::test]
    async fn test_empty_overview_is_unavailable() {
        let server = MockServer::start().await;
        mount(&server, "OVERVIEW", json!({})).await;

        let client = AlphaVantageClient::new("test-key".into()).with_base_url(server.uri());
        let err = client.fetch("NOPE").await.unwrap_err();

        assert!(matches!(err, ScreenerError::RecordUnavailable { ref ticker, .. } if ticker == "NOPE"));
    }

    #[tokio::test]
    async fn test_rate_limit_note_is_unavailable() {
        let server = MockServer::start().await;
        mount(&server, "OVERVIEW", json!({"Note": "Thank you for using Alpha Vantage!"})).await;

        let client = AlphaVantageClient::new("test-key".into()).with_base_url(server.uri());
        assert!(matches!(
            client.fetch("KO").await,
            Err(ScreenerError::RecordUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_statement_failure_degrades_to_missing_metrics() {
        let server = MockServer::start().await;
        mount(&server, "OVERVIEW", overview_json()).await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "BALANCE_SHEET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount(&server, "CASH_FLOW", json!({"Information": "premium endpoint"})).await;

        let client = AlphaVantageClient::new("test-key".into()).with_base_url(server.uri());
        let record = client.fetch("KO").await.unwrap();

        assert_eq!(record.get(Metric::DividendYield), Some(0.0305));
        assert_eq!(record.get(Metric::CurrentRatio), None);
        assert_eq!(record.get(Metric::FreeCashFlow), None);
    }
}
