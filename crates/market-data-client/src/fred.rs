use async_trait::async_trait;
use reqwest::Client;
use screener_core::{MacroIndicator, MacroIndicatorSet, MacroProvider, ScreenerError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// A FRED series id plus an optional `units` transform (e.g. `pc1` = % change from a year ago).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FredSeries {
    pub id: String,
    #[serde(default)]
    pub units: Option<String>,
}

impl FredSeries {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// Which series backs each macro indicator. `None` means "not fetched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FredSeriesConfig {
    pub inflation: Option<FredSeries>,
    pub policy_rate: Option<FredSeries>,
    pub gdp_growth: Option<FredSeries>,
    pub diffusion_index: Option<FredSeries>,
}

impl FredSeriesConfig {
    pub fn series_for(&self, indicator: MacroIndicator) -> Option<&FredSeries> {
        match indicator {
            MacroIndicator::Inflation => self.inflation.as_ref(),
            MacroIndicator::PolicyRate => self.policy_rate.as_ref(),
            MacroIndicator::GdpGrowth => self.gdp_growth.as_ref(),
            MacroIndicator::DiffusionIndex => self.diffusion_index.as_ref(),
        }
    }
}

impl Default for FredSeriesConfig {
    /// CPI YoY, effective fed funds, real GDP growth. FRED carries no
    /// manufacturing diffusion index, so that one comes from configuration.
    fn default() -> Self {
        Self {
            inflation: Some(FredSeries::new("CPIAUCSL").with_units("pc1")),
            policy_rate: Some(FredSeries::new("FEDFUNDS")),
            gdp_growth: Some(FredSeries::new("A191RL1Q225SBEA")),
            diffusion_index: None,
        }
    }
}

#[derive(Clone)]
pub struct FredClient {
    api_key: String,
    base_url: String,
    client: Client,
    series: FredSeriesConfig,
}

/// Latest usable value from a `series/observations` payload sorted newest first.
/// FRED marks gaps with ".".
fn parse_latest_observation(json: &Value) -> Result<Option<f64>, ScreenerError> {
    let observations = json["observations"]
        .as_array()
        .ok_or_else(|| ScreenerError::ApiError("No observations found in FRED response".into()))?;

    Ok(observations
        .iter()
        .filter_map(|obs| obs["value"].as_str())
        .filter(|v| *v != ".")
        .find_map(|v| v.trim().parse::<f64>().ok().filter(|x| x.is_finite())))
}

impl FredClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            series: FredSeriesConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_series(mut self, series: FredSeriesConfig) -> Self {
        self.series = series;
        self
    }

    pub async fn latest_value(&self, series: &FredSeries) -> Result<Option<f64>, ScreenerError> {
        let url = format!("{}/series/observations", self.base_url);
        let mut params = vec![
            ("series_id", series.id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", "5"),
        ];
        if let Some(units) = &series.units {
            params.push(("units", units.as_str()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ScreenerError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScreenerError::ApiError(format!(
                "FRED HTTP {} for {}",
                response.status(),
                series.id
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ScreenerError::ApiError(e.to_string()))?;

        parse_latest_observation(&json)
    }
}

#[async_trait]
impl MacroProvider for FredClient {
    async fn fetch(&self) -> MacroIndicatorSet {
        let mut indicators = MacroIndicatorSet::default();

        for indicator in MacroIndicator::ALL {
            let Some(series) = self.series.series_for(indicator) else {
                continue;
            };
            match self.latest_value(series).await {
                Ok(Some(value)) => {
                    tracing::debug!("{} ({}) = {}", indicator, series.id, value);
                    indicators.set(indicator, Some(value));
                }
                Ok(None) => tracing::warn!("{} ({}): no recent observation", indicator, series.id),
                Err(e) => tracing::warn!("{} ({}) unavailable: {}", indicator, series.id, e),
            }
        }

        indicators
    }

    fn name(&self) -> &str {
        "fred"
    }
}
