use screener_core::{ScreenerError, Verdict};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Flat CSV row for one verdict; per-rule checks are not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRow {
    pub ticker: String,
    pub satisfied: usize,
    pub effective: usize,
    pub fits_strategy: bool,
}

impl From<&Verdict> for VerdictRow {
    fn from(v: &Verdict) -> Self {
        Self {
            ticker: v.ticker.clone(),
            satisfied: v.satisfied,
            effective: v.effective,
            fits_strategy: v.fits_strategy,
        }
    }
}

pub fn write_csv<W: Write>(verdicts: &[Verdict], writer: W) -> Result<(), ScreenerError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for verdict in verdicts {
        csv_writer
            .serialize(VerdictRow::from(verdict))
            .map_err(|e| ScreenerError::Export(e.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|e| ScreenerError::Export(e.to_string()))
}

pub fn to_csv_bytes(verdicts: &[Verdict]) -> Result<Vec<u8>, ScreenerError> {
    let mut buffer = Vec::new();
    write_csv(verdicts, &mut buffer)?;
    Ok(buffer)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<VerdictRow>, ScreenerError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize()
        .map(|row| row.map_err(|e| ScreenerError::Export(e.to_string())))
        .collect()
}

/// One `TICKER: ✅/❌` line per verdict, as used in email bodies.
pub fn summary_text(verdicts: &[Verdict]) -> String {
    verdicts
        .iter()
        .map(Verdict::summary_line)
        .collect::<Vec<_>>()
        .join("\n")
}
