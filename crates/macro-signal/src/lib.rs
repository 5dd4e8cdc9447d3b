mod labels;

pub use labels::{LabelTable, LabelTier};

use screener_core::{
    Comparison, IndicatorContribution, MacroIndicator, MacroIndicatorSet, MacroSignal, ScreenerError,
};
use serde::{Deserialize, Serialize};

/// What an indicator without a value contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingIndicatorPolicy {
    /// Not scored at all (vote 0)
    #[default]
    Exclude,
    /// Scored as a failed condition (vote -1)
    Penalize,
}

impl std::str::FromStr for MissingIndicatorPolicy {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclude" => Ok(MissingIndicatorPolicy::Exclude),
            "penalize" | "penalise" => Ok(MissingIndicatorPolicy::Penalize),
            other => Err(ScreenerError::InvalidConfig(format!(
                "Unknown macro missing policy: {} (expected exclude or penalize)",
                other
            ))),
        }
    }
}

/// Favourable condition for one indicator; holds -> +1, fails -> -1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub indicator: MacroIndicator,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl IndicatorRule {
    pub fn new(indicator: MacroIndicator, comparison: Comparison, threshold: f64) -> Self {
        Self {
            indicator,
            comparison,
            threshold,
        }
    }

    fn vote(&self, indicators: &MacroIndicatorSet, missing: MissingIndicatorPolicy) -> i32 {
        let holds = indicators
            .get(self.indicator)
            .and_then(|v| self.comparison.apply(v, self.threshold));

        match (holds, missing) {
            (Some(true), _) => 1,
            (Some(false), _) => -1,
            (None, MissingIndicatorPolicy::Penalize) => -1,
            (None, MissingIndicatorPolicy::Exclude) => 0,
        }
    }
}

/// Indicator rules, missing-value handling and the label table, as one config object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRuleSet {
    pub rules: Vec<IndicatorRule>,
    #[serde(default)]
    pub missing: MissingIndicatorPolicy,
    #[serde(default)]
    pub labels: LabelTable,
}

impl MacroRuleSet {
    /// Inflation < 3, policy rate <= 4.5, GDP growth > 2, diffusion index > 50
    pub fn default_rules() -> Vec<IndicatorRule> {
        vec![
            IndicatorRule::new(MacroIndicator::Inflation, Comparison::Less, 3.0),
            IndicatorRule::new(MacroIndicator::PolicyRate, Comparison::LessOrEqual, 4.5),
            IndicatorRule::new(MacroIndicator::GdpGrowth, Comparison::Greater, 2.0),
            IndicatorRule::new(MacroIndicator::DiffusionIndex, Comparison::Greater, 50.0),
        ]
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_missing(mut self, missing: MissingIndicatorPolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.rules.is_empty() {
            return Err(ScreenerError::InvalidConfig("Macro rule set has no rules".into()));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if !rule.threshold.is_finite() {
                return Err(ScreenerError::InvalidConfig(format!(
                    "Macro rule for {} has a non-finite threshold",
                    rule.indicator
                )));
            }
            if self.rules[..i].iter().any(|r| r.indicator == rule.indicator) {
                return Err(ScreenerError::InvalidConfig(format!(
                    "Macro indicator {} has more than one rule",
                    rule.indicator
                )));
            }
        }
        self.labels.validate()
    }
}

impl Default for MacroRuleSet {
    fn default() -> Self {
        Self {
            rules: Self::default_rules(),
            missing: MissingIndicatorPolicy::default(),
            labels: LabelTable::default(),
        }
    }
}

/// Sum one +1/-1 vote per indicator and look the total up in the label table.
pub fn evaluate(indicators: &MacroIndicatorSet, rule_set: &MacroRuleSet) -> MacroSignal {
    let contributions: Vec<IndicatorContribution> = rule_set
        .rules
        .iter()
        .map(|rule| IndicatorContribution {
            indicator: rule.indicator,
            value: indicators.get(rule.indicator).filter(|v| v.is_finite()),
            vote: rule.vote(indicators, rule_set.missing),
        })
        .collect();

    let score: i32 = contributions.iter().map(|c| c.vote).sum();
    let scored = contributions.iter().filter(|c| c.vote != 0).count();

    MacroSignal {
        score,
        label: rule_set.labels.label_for(score).to_string(),
        scored,
        contributions,
    }
}

/// Macro scorer bound to a validated rule set
#[derive(Debug, Clone, Default)]
pub struct MacroSignalScorer {
    rule_set: MacroRuleSet,
}

impl MacroSignalScorer {
    pub fn new(rule_set: MacroRuleSet) -> Result<Self, ScreenerError> {
        rule_set.validate()?;
        Ok(Self { rule_set })
    }

    pub fn rule_set(&self) -> &MacroRuleSet {
        &self.rule_set
    }

    pub fn score(&self, indicators: &MacroIndicatorSet) -> MacroSignal {
        let signal = evaluate(indicators, &self.rule_set);
        if !signal.has_data() {
            tracing::warn!("No macro indicators available; signal carries no information");
            return signal;
        }
        if signal.scored < self.rule_set.rules.len() {
            tracing::warn!(
                "Macro signal based on {}/{} indicators",
                signal.scored,
                self.rule_set.rules.len()
            );
        }
        tracing::info!("Macro signal: {} (score {})", signal.label, signal.score);
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MacroIndicatorSet {
        MacroIndicatorSet {
            inflation: Some(2.5),
            policy_rate: Some(5.25),
            gdp_growth: Some(2.1),
            diffusion_index: Some(52.3),
        }
    }

    #[test]
    fn test_sample_scores_buy() {
        let signal = evaluate(&sample(), &MacroRuleSet::default());

        assert_eq!(signal.score, 2);
        assert_eq!(signal.label, "Buy");
        assert_eq!(signal.scored, 4);
        let votes: Vec<i32> = signal.contributions.iter().map(|c| c.vote).collect();
        assert_eq!(votes, vec![1, -1, 1, 1]);
        assert!(signal.has_data());
    }

    #[test]
    fn test_score_bounds() {
        let best = MacroIndicatorSet {
            inflation: Some(1.8),
            policy_rate: Some(2.0),
            gdp_growth: Some(3.5),
            diffusion_index: Some(58.0),
        };
        let worst = MacroIndicatorSet {
            inflation: Some(7.0),
            policy_rate: Some(6.0),
            gdp_growth: Some(-1.0),
            diffusion_index: Some(44.0),
        };

        let rules = MacroRuleSet::default();
        let high = evaluate(&best, &rules);
        let low = evaluate(&worst, &rules);
        assert_eq!(high.score, 4);
        assert_eq!(high.label, "Strong Buy");
        assert_eq!(low.score, -4);
        assert_eq!(low.label, "Avoid");
    }

    #[test]
    fn test_missing_indicator_excluded_by_default() {
        let indicators = sample().with(MacroIndicator::DiffusionIndex, None);
        let signal = evaluate(&indicators, &MacroRuleSet::default());

        assert_eq!(signal.score, 1);
        assert_eq!(signal.scored, 3);
        assert_eq!(signal.label, "Hold");
        assert_eq!(signal.contributions[3].vote, 0);
        assert_eq!(signal.contributions[3].value, None);
    }

    #[test]
    fn test_missing_indicator_penalized() {
        let indicators = sample().with(MacroIndicator::DiffusionIndex, None);
        let rules = MacroRuleSet::default().with_missing(MissingIndicatorPolicy::Penalize);
        let signal = evaluate(&indicators, &rules);

        assert_eq!(signal.score, 0);
        assert_eq!(signal.scored, 4);
        assert_eq!(signal.label, "Avoid");
    }

    #[test]
    fn test_no_indicators_at_all() {
        let signal = evaluate(&MacroIndicatorSet::default(), &MacroRuleSet::default());
        assert_eq!(signal.score, 0);
        assert_eq!(signal.scored, 0);
        assert_eq!(signal.label, "Avoid");
        assert!(!signal.has_data());

        let penalized = evaluate(
            &MacroIndicatorSet::default(),
            &MacroRuleSet::default().with_missing(MissingIndicatorPolicy::Penalize),
        );
        assert_eq!(penalized.scored, 4);
        assert!(!penalized.has_data());
    }

    #[test]
    fn test_boundaries_follow_comparisons() {
        let indicators = MacroIndicatorSet {
            inflation: Some(3.0),
            policy_rate: Some(4.5),
            gdp_growth: Some(2.0),
            diffusion_index: Some(50.0),
        };
        let signal = evaluate(&indicators, &MacroRuleSet::default());
        let votes: Vec<i32> = signal.contributions.iter().map(|c| c.vote).collect();
        assert_eq!(votes, vec![-1, 1, -1, -1]);
    }

    #[test]
    fn test_alternate_label_table() {
        let rules = MacroRuleSet::default().with_labels(LabelTable::cautious());
        let signal = evaluate(&sample(), &rules);
        assert_eq!(signal.label, "Bullish");
    }

    #[test]
    fn test_non_finite_value_is_missing() {
        let indicators = sample().with(MacroIndicator::Inflation, Some(f64::NAN));
        let signal = evaluate(&indicators, &MacroRuleSet::default());
        assert_eq!(signal.score, 1);
        assert_eq!(signal.scored, 3);
    }

    #[test]
    fn test_validate_rejects_duplicate_indicator() {
        let mut rules = MacroRuleSet::default();
        rules.rules.push(IndicatorRule::new(MacroIndicator::Inflation, Comparison::Less, 2.0));
        assert!(MacroSignalScorer::new(rules).is_err());
    }

    #[test]
    fn test_rule_set_from_json() {
        let json = r#"{
            "rules": [
                {"indicator": "inflation", "comparison": "<", "threshold": 3.0},
                {"indicator": "gdp_growth", "comparison": ">", "threshold": 1.5}
            ],
            "missing": "penalize"
        }"#;
        let rules: MacroRuleSet = serde_json::from_str(json).unwrap();
        rules.validate().unwrap();
        assert_eq!(rules.missing, MissingIndicatorPolicy::Penalize);
        assert_eq!(rules.labels, LabelTable::four_tier());

        let signal = MacroSignalScorer::new(rules).unwrap().score(&sample());
        assert_eq!(signal.score, 2);
    }
}
