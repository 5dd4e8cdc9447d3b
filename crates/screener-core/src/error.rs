use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    /// The whole per-ticker fetch failed; the ticker is skipped, never zero-filled.
    #[error("Record unavailable for {ticker}: {reason}")]
    RecordUnavailable { ticker: String, reason: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl ScreenerError {
    pub fn unavailable(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        ScreenerError::RecordUnavailable {
            ticker: ticker.into(),
            reason: reason.into(),
        }
    }
}
