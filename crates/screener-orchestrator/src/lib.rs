pub mod export;
pub mod screener;

pub use export::{read_csv, summary_text, to_csv_bytes, write_csv, VerdictRow};
pub use screener::{parse_tickers, Screener, ScreeningSession, StockUniverse, TickerWarning};
