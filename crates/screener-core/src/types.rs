use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ScreenerError;

/// Fundamental metrics a threshold rule can look at.
///
/// Ratios are fractions (0.019 = 1.9%), free cash flow is in the reporting currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DividendYield,
    PayoutRatio,
    RevenueGrowth,
    TrailingPe,
    DebtToEquity,
    ReturnOnEquity,
    GrossMargin,
    OperatingMargin,
    CurrentRatio,
    FreeCashFlow,
    PegRatio,
    EvToEbitda,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::DividendYield,
        Metric::PayoutRatio,
        Metric::RevenueGrowth,
        Metric::TrailingPe,
        Metric::DebtToEquity,
        Metric::ReturnOnEquity,
        Metric::GrossMargin,
        Metric::OperatingMargin,
        Metric::CurrentRatio,
        Metric::FreeCashFlow,
        Metric::PegRatio,
        Metric::EvToEbitda,
    ];

    /// Stable snake_case key, as used in rule files and exports
    pub fn name(&self) -> &'static str {
        match self {
            Metric::DividendYield => "dividend_yield",
            Metric::PayoutRatio => "payout_ratio",
            Metric::RevenueGrowth => "revenue_growth",
            Metric::TrailingPe => "trailing_pe",
            Metric::DebtToEquity => "debt_to_equity",
            Metric::ReturnOnEquity => "return_on_equity",
            Metric::GrossMargin => "gross_margin",
            Metric::OperatingMargin => "operating_margin",
            Metric::CurrentRatio => "current_ratio",
            Metric::FreeCashFlow => "free_cash_flow",
            Metric::PegRatio => "peg_ratio",
            Metric::EvToEbitda => "ev_to_ebitda",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Metric::DividendYield => "Dividend Yield",
            Metric::PayoutRatio => "Payout Ratio",
            Metric::RevenueGrowth => "Revenue Growth",
            Metric::TrailingPe => "Trailing P/E",
            Metric::DebtToEquity => "Debt to Equity",
            Metric::ReturnOnEquity => "Return on Equity",
            Metric::GrossMargin => "Gross Margin",
            Metric::OperatingMargin => "Operating Margin",
            Metric::CurrentRatio => "Current Ratio",
            Metric::FreeCashFlow => "Free Cash Flow",
            Metric::PegRatio => "PEG Ratio",
            Metric::EvToEbitda => "EV/EBITDA",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == key)
            .ok_or_else(|| ScreenerError::InvalidConfig(format!("Unknown metric: {}", s)))
    }
}

/// Parse a raw provider value. Placeholders such as "None", "-" or "" and
/// anything that is not a finite number come back as `None`. A trailing `%`
/// is converted to a fraction ("1.9%" -> 0.019).
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let (number, scale) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim(), 100.0),
        None => (trimmed, 1.0),
    };
    match number {
        "" | "-" | "None" | "none" | "N/A" | "n/a" | "null" => None,
        s => s.parse::<f64>().ok().map(|v| v / scale).filter(|v| v.is_finite()),
    }
}

/// Per-ticker fundamentals snapshot. Absent metrics are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    values: BTreeMap<Metric, f64>,
}

impl FundamentalsRecord {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.set(metric, value);
        self
    }

    /// Build a record from raw provider strings; unparseable values become absent.
    pub fn from_raw<'a, I>(ticker: impl Into<String>, raw: I) -> Self
    where
        I: IntoIterator<Item = (Metric, &'a str)>,
    {
        let mut record = Self::new(ticker);
        for (metric, value) in raw {
            record.set(metric, parse_metric_value(value));
        }
        record
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        match value {
            Some(v) => {
                self.values.insert(metric, v);
            }
            None => {
                self.values.remove(&metric);
            }
        }
    }

    /// Raw stored value. May be non-finite if a provider handed one over;
    /// scorers treat those as absent.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    /// Number of metrics holding a usable (finite) value
    pub fn available_count(&self) -> usize {
        self.values.values().filter(|v| v.is_finite()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.available_count() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(m, v)| (*m, *v))
    }
}

/// Comparison operator used by threshold predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Comparison {
    /// Evaluate `value <op> threshold`. Returns `None` for non-finite inputs.
    pub fn apply(&self, value: f64, threshold: f64) -> Option<bool> {
        if !value.is_finite() || !threshold.is_finite() {
            return None;
        }
        Some(match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How a single rule resolved for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// Metric absent, resolved as a pass by policy
    MissingPassed,
    /// Metric absent, resolved as a fail by policy
    MissingFailed,
    /// Metric absent, left out of both numerator and denominator
    Excluded,
}

impl CheckOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, CheckOutcome::Passed | CheckOutcome::MissingPassed)
    }

    pub fn is_effective(&self) -> bool {
        !matches!(self, CheckOutcome::Excluded)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CheckOutcome::Passed => "✅",
            CheckOutcome::Failed => "❌",
            CheckOutcome::MissingPassed => "✅ (n/a)",
            CheckOutcome::MissingFailed => "❌ (n/a)",
            CheckOutcome::Excluded => "➖",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule: String,
    pub metric: Metric,
    pub value: Option<f64>,
    pub outcome: CheckOutcome,
}

/// Scoring result for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub ticker: String,
    pub satisfied: usize,
    pub effective: usize,
    pub fits_strategy: bool,
    #[serde(default)]
    pub checks: Vec<RuleCheck>,
}

impl Verdict {
    /// Satisfied share of the effective rules, `None` when nothing was checked
    pub fn ratio(&self) -> Option<f64> {
        if self.effective == 0 {
            None
        } else {
            Some(self.satisfied as f64 / self.effective as f64)
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: {}",
            self.ticker,
            if self.fits_strategy { "✅" } else { "❌" }
        )
    }
}

/// Macro indicators understood by the macro scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroIndicator {
    Inflation,
    PolicyRate,
    GdpGrowth,
    DiffusionIndex,
}

impl MacroIndicator {
    pub const ALL: [MacroIndicator; 4] = [
        MacroIndicator::Inflation,
        MacroIndicator::PolicyRate,
        MacroIndicator::GdpGrowth,
        MacroIndicator::DiffusionIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MacroIndicator::Inflation => "inflation",
            MacroIndicator::PolicyRate => "policy_rate",
            MacroIndicator::GdpGrowth => "gdp_growth",
            MacroIndicator::DiffusionIndex => "diffusion_index",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MacroIndicator::Inflation => "Inflation (YoY %)",
            MacroIndicator::PolicyRate => "Policy Rate (%)",
            MacroIndicator::GdpGrowth => "GDP Growth (%)",
            MacroIndicator::DiffusionIndex => "Diffusion Index",
        }
    }
}

impl fmt::Display for MacroIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MacroIndicator {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        MacroIndicator::ALL
            .iter()
            .copied()
            .find(|i| i.name() == key)
            .ok_or_else(|| ScreenerError::InvalidConfig(format!("Unknown macro indicator: {}", s)))
    }
}

/// Latest macro readings; each one may be missing if its fetch failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroIndicatorSet {
    pub inflation: Option<f64>,
    pub policy_rate: Option<f64>,
    pub gdp_growth: Option<f64>,
    pub diffusion_index: Option<f64>,
}

impl MacroIndicatorSet {
    pub fn get(&self, indicator: MacroIndicator) -> Option<f64> {
        match indicator {
            MacroIndicator::Inflation => self.inflation,
            MacroIndicator::PolicyRate => self.policy_rate,
            MacroIndicator::GdpGrowth => self.gdp_growth,
            MacroIndicator::DiffusionIndex => self.diffusion_index,
        }
    }

    pub fn set(&mut self, indicator: MacroIndicator, value: Option<f64>) {
        let slot = match indicator {
            MacroIndicator::Inflation => &mut self.inflation,
            MacroIndicator::PolicyRate => &mut self.policy_rate,
            MacroIndicator::GdpGrowth => &mut self.gdp_growth,
            MacroIndicator::DiffusionIndex => &mut self.diffusion_index,
        };
        *slot = value;
    }

    pub fn with(mut self, indicator: MacroIndicator, value: Option<f64>) -> Self {
        self.set(indicator, value);
        self
    }

    /// Values present in `other` replace ours; absent ones leave ours untouched.
    pub fn overlay(&self, other: &MacroIndicatorSet) -> MacroIndicatorSet {
        let mut merged = *self;
        for indicator in MacroIndicator::ALL {
            if let Some(v) = other.get(indicator) {
                merged.set(indicator, Some(v));
            }
        }
        merged
    }

    pub fn available_count(&self) -> usize {
        MacroIndicator::ALL
            .iter()
            .filter(|i| self.get(**i).map_or(false, f64::is_finite))
            .count()
    }
}

/// One indicator's vote in a macro score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorContribution {
    pub indicator: MacroIndicator,
    pub value: Option<f64>,
    /// +1, -1, or 0 when the indicator was excluded
    pub vote: i32,
}

/// Summed macro score and its ordinal label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroSignal {
    pub score: i32,
    pub label: String,
    /// Indicators that actually voted
    pub scored: usize,
    #[serde(default)]
    pub contributions: Vec<IndicatorContribution>,
}

impl MacroSignal {
    /// False when no indicator had a reading; the score and label then
    /// reflect only the missing-data policy.
    pub fn has_data(&self) -> bool {
        self.contributions.iter().any(|c| c.value.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.name()));
        }
        assert!("dividend".parse::<Metric>().is_err());
    }

    #[test]
    fn test_parse_metric_value_placeholders() {
        assert_eq!(parse_metric_value("0.0235"), Some(0.0235));
        assert_eq!(parse_metric_value(" 12.5 "), Some(12.5));
        assert_eq!(parse_metric_value("None"), None);
        assert_eq!(parse_metric_value("-"), None);
        assert_eq!(parse_metric_value(""), None);
        assert_eq!(parse_metric_value("abc"), None);
        assert_eq!(parse_metric_value("NaN"), None);
    }

    #[test]
    fn test_parse_metric_value_percent_is_fraction() {
        assert!((parse_metric_value("1.9%").unwrap() - 0.019).abs() < 1e-12);
        assert!((parse_metric_value(" 60 % ").unwrap() - 0.60).abs() < 1e-12);
        assert_eq!(parse_metric_value("%"), None);
        assert_eq!(parse_metric_value("None%"), None);
    }

    #[test]
    fn test_record_from_raw_skips_malformed() {
        let record = FundamentalsRecord::from_raw(
            "KO",
            vec![
                (Metric::DividendYield, "0.031"),
                (Metric::TrailingPe, "None"),
                (Metric::PayoutRatio, "n/a"),
            ],
        );
        assert_eq!(record.get(Metric::DividendYield), Some(0.031));
        assert_eq!(record.get(Metric::TrailingPe), None);
        assert_eq!(record.available_count(), 1);
    }

    #[test]
    fn test_record_set_none_removes_value() {
        let mut record = FundamentalsRecord::new("PG").with(Metric::CurrentRatio, Some(1.2));
        record.set(Metric::CurrentRatio, None);
        assert!(record.is_empty());
    }

    #[test]
    fn test_comparison_boundaries() {
        assert_eq!(Comparison::GreaterOrEqual.apply(0.019, 0.019), Some(true));
        assert_eq!(Comparison::Greater.apply(0.019, 0.019), Some(false));
        assert_eq!(Comparison::LessOrEqual.apply(4.5, 4.5), Some(true));
        assert_eq!(Comparison::Less.apply(4.5, 4.5), Some(false));
        assert_eq!(Comparison::Less.apply(f64::NAN, 1.0), None);
        assert_eq!(Comparison::Less.apply(1.0, f64::INFINITY), None);
    }

    #[test]
    fn test_comparison_serde_symbols() {
        let cmp: Comparison = serde_json::from_str("\">=\"").unwrap();
        assert_eq!(cmp, Comparison::GreaterOrEqual);
        assert_eq!(serde_json::to_string(&Comparison::Less).unwrap(), "\"<\"");
    }

    #[test]
    fn test_macro_overlay_prefers_present_values() {
        let fetched = MacroIndicatorSet {
            inflation: Some(3.4),
            policy_rate: Some(5.25),
            gdp_growth: None,
            diffusion_index: None,
        };
        let configured = MacroIndicatorSet::default()
            .with(MacroIndicator::DiffusionIndex, Some(52.3))
            .with(MacroIndicator::Inflation, Some(2.5));

        let merged = fetched.overlay(&configured);
        assert_eq!(merged.inflation, Some(2.5));
        assert_eq!(merged.policy_rate, Some(5.25));
        assert_eq!(merged.gdp_growth, None);
        assert_eq!(merged.diffusion_index, Some(52.3));
        assert_eq!(merged.available_count(), 3);
    }

    #[test]
    fn test_verdict_ratio() {
        let verdict = Verdict {
            ticker: "JNJ".into(),
            satisfied: 6,
            effective: 8,
            fits_strategy: false,
            checks: Vec::new(),
        };
        assert_eq!(verdict.ratio(), Some(0.75));
        assert_eq!(verdict.summary_line(), "JNJ: ❌");
    }
}
