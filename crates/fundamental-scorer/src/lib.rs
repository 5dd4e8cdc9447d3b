mod rules;

pub use rules::{MissingPolicy, PassCriterion, RuleSet, ScoringPolicy, ThresholdRule};

use screener_core::{FundamentalsRecord, RuleCheck, ScreenerError, Verdict};

/// Score one record against a list of rules.
///
/// Pure: no I/O, no shared state. A metric that is absent or not a finite
/// number is resolved by the missing policy (the rule's own override first),
/// so individual rule failures never escape as errors.
pub fn evaluate(record: &FundamentalsRecord, rules: &[ThresholdRule], policy: &ScoringPolicy) -> Verdict {
    let mut checks = Vec::with_capacity(rules.len());
    let mut satisfied = 0usize;
    let mut effective = 0usize;

    for rule in rules {
        let outcome = rule.resolve(record, policy.missing);
        tracing::debug!(
            ticker = %record.ticker,
            rule = %rule.name,
            value = ?record.get(rule.metric),
            outcome = ?outcome,
            "Rule resolved"
        );

        if outcome.is_effective() {
            effective += 1;
        }
        if outcome.is_satisfied() {
            satisfied += 1;
        }

        checks.push(RuleCheck {
            rule: rule.name.clone(),
            metric: rule.metric,
            value: record.get(rule.metric).filter(|v| v.is_finite()),
            outcome,
        });
    }

    let fits_strategy = if effective == 0 {
        policy.vacuous_pass
    } else {
        policy.criterion.is_met(satisfied, effective)
    };

    Verdict {
        ticker: record.ticker.clone(),
        satisfied,
        effective,
        fits_strategy,
        checks,
    }
}

/// Scorer bound to a validated rule set
#[derive(Debug, Clone)]
pub struct FundamentalsScorer {
    rule_set: RuleSet,
}

impl FundamentalsScorer {
    pub fn new(rule_set: RuleSet) -> Result<Self, ScreenerError> {
        rule_set.validate()?;
        Ok(Self { rule_set })
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    pub fn score(&self, record: &FundamentalsRecord) -> Verdict {
        let verdict = evaluate(record, &self.rule_set.rules, &self.rule_set.policy);
        tracing::debug!(
            "{}: {}/{} rules satisfied under '{}' -> {}",
            verdict.ticker,
            verdict.satisfied,
            verdict.effective,
            self.rule_set.name,
            if verdict.fits_strategy { "fits" } else { "does not fit" }
        );
        verdict
    }
}

impl Default for FundamentalsScorer {
    fn default() -> Self {
        Self {
            rule_set: RuleSet::relaxed(),
        }
    }
}
