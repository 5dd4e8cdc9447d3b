use screener_core::{CheckOutcome, Comparison, FundamentalsRecord, Metric, ScreenerError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What an absent (or malformed) metric resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Counts as satisfied
    Pass,
    /// Counts as not satisfied
    Fail,
    /// Dropped from both the satisfied count and the effective count
    #[default]
    Neutral,
}

impl std::str::FromStr for MissingPolicy {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" => Ok(MissingPolicy::Pass),
            "fail" => Ok(MissingPolicy::Fail),
            "neutral" | "exclude" => Ok(MissingPolicy::Neutral),
            other => Err(ScreenerError::InvalidConfig(format!(
                "Unknown missing policy: {} (expected pass, fail or neutral)",
                other
            ))),
        }
    }
}

/// Rule for turning the satisfied count into a fits/doesn't-fit verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassCriterion {
    /// Every effective rule must hold
    AllRules,
    /// At least this many rules must hold
    MinSatisfied(usize),
}

impl PassCriterion {
    pub fn is_met(&self, satisfied: usize, effective: usize) -> bool {
        match self {
            PassCriterion::AllRules => satisfied == effective,
            PassCriterion::MinSatisfied(n) => satisfied >= *n,
        }
    }
}

impl Default for PassCriterion {
    fn default() -> Self {
        PassCriterion::MinSatisfied(7)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default)]
    pub missing: MissingPolicy,
    #[serde(default)]
    pub criterion: PassCriterion,
    /// With nothing left to check, the record fits. Kept switchable because
    /// it lets a ticker with no data at all through.
    #[serde(default = "default_vacuous_pass")]
    pub vacuous_pass: bool,
}

fn default_vacuous_pass() -> bool {
    true
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            missing: MissingPolicy::default(),
            criterion: PassCriterion::default(),
            vacuous_pass: default_vacuous_pass(),
        }
    }
}

/// Named predicate over one metric: `metric <comparison> threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub name: String,
    pub metric: Metric,
    pub comparison: Comparison,
    pub threshold: f64,
    /// Overrides the rule set's missing policy for this rule only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_missing: Option<MissingPolicy>,
}

impl ThresholdRule {
    pub fn new(name: impl Into<String>, metric: Metric, comparison: Comparison, threshold: f64) -> Self {
        Self {
            name: name.into(),
            metric,
            comparison,
            threshold,
            on_missing: None,
        }
    }

    pub fn on_missing(mut self, policy: MissingPolicy) -> Self {
        self.on_missing = Some(policy);
        self
    }

    pub fn describe(&self) -> String {
        format!("{} {} {}", self.metric.name(), self.comparison, self.threshold)
    }

    /// Resolve this rule against a record. A comparison that cannot be made
    /// (metric absent or non-finite) falls through to the missing policy.
    pub fn resolve(&self, record: &FundamentalsRecord, default_missing: MissingPolicy) -> CheckOutcome {
        let compared = record
            .get(self.metric)
            .and_then(|value| self.comparison.apply(value, self.threshold));

        match compared {
            Some(true) => CheckOutcome::Passed,
            Some(false) => CheckOutcome::Failed,
            None => match self.on_missing.unwrap_or(default_missing) {
                MissingPolicy::Pass => CheckOutcome::MissingPassed,
                MissingPolicy::Fail => CheckOutcome::MissingFailed,
                MissingPolicy::Neutral => CheckOutcome::Excluded,
            },
        }
    }
}

/// A complete screening configuration: the rules plus how to score them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<ThresholdRule>,
    #[serde(default)]
    pub policy: ScoringPolicy,
}

impl RuleSet {
    pub const PRESETS: [&'static str; 3] = ["strict", "relaxed", "extended"];

    /// Ten core rules; every one must hold and a missing metric is a miss.
    pub fn strict() -> Self {
        use Comparison::*;
        use Metric::*;

        Self {
            name: "strict".to_string(),
            rules: vec![
                ThresholdRule::new("Dividend Yield >= 1.9%", DividendYield, GreaterOrEqual, 0.019),
                ThresholdRule::new("Payout Ratio <= 60%", PayoutRatio, LessOrEqual, 0.60),
                ThresholdRule::new("Revenue Growth >= 5%", RevenueGrowth, GreaterOrEqual, 0.05),
                ThresholdRule::new("Trailing P/E <= 20", TrailingPe, LessOrEqual, 20.0),
                ThresholdRule::new("Debt/Equity <= 1.0", DebtToEquity, LessOrEqual, 1.0),
                ThresholdRule::new("ROE >= 15%", ReturnOnEquity, GreaterOrEqual, 0.15),
                ThresholdRule::new("Gross Margin >= 40%", GrossMargin, GreaterOrEqual, 0.40),
                ThresholdRule::new("Operating Margin >= 15%", OperatingMargin, GreaterOrEqual, 0.15),
                ThresholdRule::new("Current Ratio >= 1.5", CurrentRatio, GreaterOrEqual, 1.5),
                ThresholdRule::new("Free Cash Flow > 0", FreeCashFlow, Greater, 0.0),
            ],
            policy: ScoringPolicy {
                missing: MissingPolicy::Fail,
                criterion: PassCriterion::AllRules,
                vacuous_pass: true,
            },
        }
    }

    /// Loosened thresholds, 7 of 10 required, missing data left out.
    pub fn relaxed() -> Self {
        use Comparison::*;
        use Metric::*;

        Self {
            name: "relaxed".to_string(),
            rules: vec![
                ThresholdRule::new("Dividend Yield >= 1.5%", DividendYield, GreaterOrEqual, 0.015),
                ThresholdRule::new("Payout Ratio <= 75%", PayoutRatio, LessOrEqual, 0.75),
                ThresholdRule::new("Revenue Growth >= 0%", RevenueGrowth, GreaterOrEqual, 0.0),
                ThresholdRule::new("Trailing P/E <= 25", TrailingPe, LessOrEqual, 25.0),
                ThresholdRule::new("Debt/Equity <= 1.5", DebtToEquity, LessOrEqual, 1.5),
                ThresholdRule::new("ROE >= 10%", ReturnOnEquity, GreaterOrEqual, 0.10),
                ThresholdRule::new("Gross Margin >= 30%", GrossMargin, GreaterOrEqual, 0.30),
                ThresholdRule::new("Operating Margin >= 10%", OperatingMargin, GreaterOrEqual, 0.10),
                ThresholdRule::new("Current Ratio >= 1.0", CurrentRatio, GreaterOrEqual, 1.0),
                ThresholdRule::new("Free Cash Flow > 0", FreeCashFlow, Greater, 0.0),
            ],
            policy: ScoringPolicy {
                missing: MissingPolicy::Neutral,
                criterion: PassCriterion::MinSatisfied(7),
                vacuous_pass: true,
            },
        }
    }

    /// Relaxed rules plus valuation checks on PEG and EV/EBITDA.
    pub fn extended() -> Self {
        let mut rule_set = Self::relaxed();
        rule_set.name = "extended".to_string();
        rule_set.rules.push(ThresholdRule::new(
            "PEG Ratio <= 2.0",
            Metric::PegRatio,
            Comparison::LessOrEqual,
            2.0,
        ));
        rule_set.rules.push(ThresholdRule::new(
            "EV/EBITDA <= 15",
            Metric::EvToEbitda,
            Comparison::LessOrEqual,
            15.0,
        ));
        rule_set.policy = ScoringPolicy {
            missing: MissingPolicy::Pass,
            criterion: PassCriterion::MinSatisfied(8),
            vacuous_pass: true,
        };
        rule_set
    }

    pub fn preset(name: &str) -> Result<Self, ScreenerError> {
        match name.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::strict()),
            "relaxed" => Ok(Self::relaxed()),
            "extended" => Ok(Self::extended()),
            other => Err(ScreenerError::InvalidConfig(format!(
                "Unknown rule set preset: {} (expected one of {})",
                other,
                Self::PRESETS.join(", ")
            ))),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScreenerError> {
        let rule_set: RuleSet = serde_json::from_str(json)
            .map_err(|e| ScreenerError::InvalidConfig(format!("Invalid rule set JSON: {}", e)))?;
        rule_set.validate()?;
        Ok(rule_set)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScreenerError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScreenerError::InvalidConfig(format!("Cannot read rule set {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Resolve a preset name, or load the argument as a JSON file path.
    pub fn load(source: &str) -> Result<Self, ScreenerError> {
        if Self::PRESETS.contains(&source.trim().to_lowercase().as_str()) {
            Self::preset(source)
        } else {
            Self::from_file(Path::new(source))
        }
    }

    pub fn with_policy(mut self, policy: ScoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.rules.is_empty() {
            return Err(ScreenerError::InvalidConfig(format!(
                "Rule set '{}' has no rules",
                self.name
            )));
        }

        if let Some(rule) = self.rules.iter().find(|r| !r.threshold.is_finite()) {
            return Err(ScreenerError::InvalidConfig(format!(
                "Rule '{}' has a non-finite threshold",
                rule.name
            )));
        }

        if let PassCriterion::MinSatisfied(n) = self.policy.criterion {
            if n == 0 || n > self.rules.len() {
                return Err(ScreenerError::InvalidConfig(format!(
                    "Pass threshold {} must be between 1 and {} for rule set '{}'",
                    n,
                    self.rules.len(),
                    self.name
                )));
            }
        }

        Ok(())
    }
}
