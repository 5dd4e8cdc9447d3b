use anyhow::{Context, Result};
use fundamental_scorer::MissingPolicy;
use macro_signal::MissingIndicatorPolicy;
use notification_service::NotificationConfig;
use screener_core::{MacroIndicator, MacroIndicatorSet};
use screener_orchestrator::parse_tickers;
use std::env;

/// Everything the binary reads from the environment (or `.env`).
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    // Data sources
    pub alpha_vantage_api_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub requests_per_minute: usize,

    // Screening
    pub tickers: Vec<String>,
    pub rule_set: String,
    pub missing_policy: Option<MissingPolicy>,

    // Macro signal
    pub label_table: String,
    pub macro_missing: MissingIndicatorPolicy,
    pub macro_values: MacroIndicatorSet,

    pub notification: NotificationConfig,
}

impl ScreenerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut macro_values = MacroIndicatorSet::default();
        for (key, indicator) in [
            ("MACRO_INFLATION", MacroIndicator::Inflation),
            ("MACRO_POLICY_RATE", MacroIndicator::PolicyRate),
            ("MACRO_GDP_GROWTH", MacroIndicator::GdpGrowth),
            ("MACRO_DIFFUSION_INDEX", MacroIndicator::DiffusionIndex),
        ] {
            if let Some(raw) = get(key) {
                let value: f64 = raw.parse().with_context(|| format!("{} is not a number: {}", key, raw))?;
                macro_values.set(indicator, Some(value));
            }
        }

        let config = Self {
            alpha_vantage_api_key: get("ALPHA_VANTAGE_API_KEY"),
            fred_api_key: get("FRED_API_KEY"),
            requests_per_minute: get("ALPHA_VANTAGE_RATE_LIMIT")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("ALPHA_VANTAGE_RATE_LIMIT must be a whole number")?,

            tickers: parse_tickers(&get("SCREENER_TICKERS").unwrap_or_default()),
            rule_set: get("SCREENER_RULESET").unwrap_or_else(|| "relaxed".to_string()),
            missing_policy: get("SCREENER_MISSING_POLICY").map(|s| s.parse()).transpose()?,

            label_table: get("MACRO_LABEL_TABLE").unwrap_or_else(|| "four_tier".to_string()),
            macro_missing: get("MACRO_MISSING_POLICY")
                .unwrap_or_else(|| "exclude".to_string())
                .parse()?,
            macro_values,

            notification: NotificationConfig::from_lookup(&lookup),
        };

        Ok(config)
    }
}
