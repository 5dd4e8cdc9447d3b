use chrono::{DateTime, Utc};
use fundamental_scorer::FundamentalsScorer;
use macro_signal::MacroSignalScorer;
use screener_core::{FundamentalsProvider, MacroProvider, MacroSignal, ScreenerError, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum StockUniverse {
    Custom(Vec<String>),
    DividendStaples,
    BlueChips,
}

impl StockUniverse {
    pub fn get_symbols(&self) -> Vec<String> {
        match self {
            StockUniverse::Custom(symbols) => symbols.clone(),
            StockUniverse::DividendStaples => vec![
                "KO", "PEP", "PG", "JNJ", "CL", "KMB", "GIS", "MO", "PM", "MDLZ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            StockUniverse::BlueChips => vec![
                "AAPL", "MSFT", "JPM", "JNJ", "V", "WMT", "PG", "MA", "HD", "CVX", "MCD",
                "KO", "PEP", "CSCO", "VZ", "MRK", "ABBV",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "dividend_staples" | "staples" => Some(StockUniverse::DividendStaples),
            "blue_chips" | "bluechips" => Some(StockUniverse::BlueChips),
            _ => None,
        }
    }
}

/// Split free-form ticker input (commas, spaces, newlines), uppercase, drop
/// blanks and duplicates while keeping the first-seen order.
pub fn parse_tickers(input: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for raw in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let ticker = raw.trim().to_uppercase();
        if !ticker.is_empty() && !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

/// A ticker that was skipped, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerWarning {
    pub ticker: String,
    pub message: String,
}

/// Caller-owned results of one or more screening runs.
///
/// Passed into each run and handed back with the new verdicts appended,
/// replacing any process-wide result history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningSession {
    pub started_at: DateTime<Utc>,
    pub verdicts: Vec<Verdict>,
    pub warnings: Vec<TickerWarning>,
    pub macro_signal: Option<MacroSignal>,
}

impl ScreeningSession {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            verdicts: Vec::new(),
            warnings: Vec::new(),
            macro_signal: None,
        }
    }

    pub fn fits_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.fits_strategy).count()
    }

    pub fn passing(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| v.fits_strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn clear(&mut self) {
        self.verdicts.clear();
        self.warnings.clear();
        self.macro_signal = None;
    }
}

impl Default for ScreeningSession {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Screener {
    provider: Arc<dyn FundamentalsProvider>,
    scorer: FundamentalsScorer,
}

impl Screener {
    pub fn new(provider: Arc<dyn FundamentalsProvider>, scorer: FundamentalsScorer) -> Self {
        Self { provider, scorer }
    }

    pub fn scorer(&self) -> &FundamentalsScorer {
        &self.scorer
    }

    /// Fetch and score each ticker in order. A ticker whose fetch fails is
    /// recorded as a warning and skipped; the rest of the batch carries on.
    pub async fn screen_batch(&self, tickers: &[String], mut session: ScreeningSession) -> ScreeningSession {
        tracing::info!(
            "📊 Screening {} tickers via {} with rule set '{}'",
            tickers.len(),
            self.provider.name(),
            self.scorer.rule_set().name
        );

        let mut screened = 0usize;
        for ticker in tickers {
            match self.provider.fetch(ticker).await {
                Ok(record) => {
                    let verdict = self.scorer.score(&record);
                    screened += 1;
                    session.verdicts.push(verdict);
                }
                Err(e) => {
                    let message = match e {
                        ScreenerError::RecordUnavailable { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!("Skipping {}: {}", ticker, message);
                    session.warnings.push(TickerWarning {
                        ticker: ticker.clone(),
                        message,
                    });
                }
            }
        }

        tracing::info!(
            "✅ Screen complete: {}/{} tickers scored, {} fit the strategy",
            screened,
            tickers.len(),
            session.fits_count()
        );
        session
    }

    /// Fetch macro indicators and store the resulting signal on the session.
    pub async fn attach_macro(
        &self,
        provider: &dyn MacroProvider,
        scorer: &MacroSignalScorer,
        mut session: ScreeningSession,
    ) -> ScreeningSession {
        let indicators = provider.fetch().await;
        session.macro_signal = Some(scorer.score(&indicators));
        session
    }
}
