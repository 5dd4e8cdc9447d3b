use async_trait::async_trait;
use crate::{FundamentalsRecord, MacroIndicatorSet, ScreenerError};

/// Source of per-ticker fundamentals.
///
/// A failed fetch must surface as `ScreenerError::RecordUnavailable` so the
/// caller can skip the ticker instead of scoring an empty record.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<FundamentalsRecord, ScreenerError>;
    fn name(&self) -> &str;
}

/// Source of macro indicators. Individual indicators degrade to `None`;
/// the set as a whole is always returned.
#[async_trait]
pub trait MacroProvider: Send + Sync {
    async fn fetch(&self) -> MacroIndicatorSet;
    fn name(&self) -> &str;
}
