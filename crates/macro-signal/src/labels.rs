use screener_core::ScreenerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTier {
    /// Lowest score (inclusive) that earns this label
    pub min_score: i32,
    pub label: String,
}

/// Step function from macro score to label.
///
/// Tiers are checked top-down; the first whose `min_score` the score reaches
/// wins, anything below the last tier gets `fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    pub tiers: Vec<LabelTier>,
    pub fallback: String,
}

fn tier(min_score: i32, label: &str) -> LabelTier {
    LabelTier {
        min_score,
        label: label.to_string(),
    }
}

impl LabelTable {
    pub const PRESETS: [&'static str; 3] = ["four_tier", "five_tier", "cautious"];

    /// >=3 Strong Buy, 2 Buy, 1 Hold, otherwise Avoid
    pub fn four_tier() -> Self {
        Self {
            tiers: vec![tier(3, "Strong Buy"), tier(2, "Buy"), tier(1, "Hold")],
            fallback: "Avoid".to_string(),
        }
    }

    /// >=3 Strong Buy, 2 Buy, 1 Hold, 0 Neutral, otherwise Avoid
    pub fn five_tier() -> Self {
        Self {
            tiers: vec![
                tier(3, "Strong Buy"),
                tier(2, "Buy"),
                tier(1, "Hold"),
                tier(0, "Neutral"),
            ],
            fallback: "Avoid".to_string(),
        }
    }

    /// >=2 Bullish, 1 Mildly Bullish, 0 Neutral, otherwise Bearish
    pub fn cautious() -> Self {
        Self {
            tiers: vec![tier(2, "Bullish"), tier(1, "Mildly Bullish"), tier(0, "Neutral")],
            fallback: "Bearish".to_string(),
        }
    }

    pub fn preset(name: &str) -> Result<Self, ScreenerError> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "four_tier" => Ok(Self::four_tier()),
            "five_tier" => Ok(Self::five_tier()),
            "cautious" => Ok(Self::cautious()),
            other => Err(ScreenerError::InvalidConfig(format!(
                "Unknown label table: {} (expected one of {})",
                other,
                Self::PRESETS.join(", ")
            ))),
        }
    }

    pub fn label_for(&self, score: i32) -> &str {
        self.tiers
            .iter()
            .find(|t| score >= t.min_score)
            .map(|t| t.label.as_str())
            .unwrap_or(self.fallback.as_str())
    }

    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.fallback.trim().is_empty() || self.tiers.iter().any(|t| t.label.trim().is_empty()) {
            return Err(ScreenerError::InvalidConfig("Label table has an empty label".into()));
        }
        if self.tiers.windows(2).any(|w| w[0].min_score <= w[1].min_score) {
            return Err(ScreenerError::InvalidConfig(
                "Label table breakpoints must be strictly descending".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::four_tier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_tier_labels() {
        let table = LabelTable::four_tier();
        assert_eq!(table.label_for(4), "Strong Buy");
        assert_eq!(table.label_for(3), "Strong Buy");
        assert_eq!(table.label_for(2), "Buy");
        assert_eq!(table.label_for(1), "Hold");
        assert_eq!(table.label_for(0), "Avoid");
        assert_eq!(table.label_for(-4), "Avoid");
    }

    #[test]
    fn test_cautious_labels() {
        let table = LabelTable::cautious();
        assert_eq!(table.label_for(3), "Bullish");
        assert_eq!(table.label_for(1), "Mildly Bullish");
        assert_eq!(table.label_for(0), "Neutral");
        assert_eq!(table.label_for(-1), "Bearish");
    }

    #[test]
    fn test_presets_validate() {
        for name in LabelTable::PRESETS {
            LabelTable::preset(name).unwrap().validate().unwrap();
        }
        assert_eq!(LabelTable::preset("five-tier").unwrap(), LabelTable::five_tier());
        assert!(LabelTable::preset("seven_tier").is_err());
    }

    #[test]
    fn test_validate_rejects_unordered_tiers() {
        let table = LabelTable {
            tiers: vec![tier(1, "Hold"), tier(2, "Buy")],
            fallback: "Avoid".into(),
        };
        assert!(table.validate().is_err());

        let table = LabelTable {
            tiers: vec![tier(1, "Hold")],
            fallback: " ".into(),
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_label_table_from_json() {
        let json = r#"{"tiers": [{"min_score": 2, "label": "Go"}], "fallback": "Wait"}"#;
        let table: LabelTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.label_for(2), "Go");
        assert_eq!(table.label_for(1), "Wait");
    }
}
