//! HTTP data sources for the screener: Alpha Vantage fundamentals and FRED
//! macro series, plus a configured-value macro source.
//!
//! No retries and no caching; a failed ticker is reported as
//! `RecordUnavailable` and the caller moves on.

mod alpha_vantage;
mod fred;
mod rate_limiter;
mod static_macro;

pub use alpha_vantage::AlphaVantageClient;
pub use fred::{FredClient, FredSeries, FredSeriesConfig};
pub use static_macro::{OverlayMacroProvider, StaticMacroProvider};
