use screener_core::{MacroSignal, Verdict};
use screener_orchestrator::ScreeningSession;
use std::fmt::Write;

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 1.0e6 => format!("{:.2e}", v),
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

fn verdict_details(out: &mut String, verdict: &Verdict) {
    for check in &verdict.checks {
        let _ = writeln!(
            out,
            "    {:<36} {:>12}  {}",
            check.rule,
            format_value(check.value),
            check.outcome.symbol()
        );
    }
}

fn macro_section(out: &mut String, signal: &MacroSignal) {
    let _ = writeln!(out);
    if !signal.has_data() {
        let _ = writeln!(out, "Macro signal: no macro data (set FRED_API_KEY or MACRO_* values)");
        return;
    }
    let _ = writeln!(out, "Macro signal: {} (score {:+}, {} indicators scored)", signal.label, signal.score, signal.scored);
    for c in &signal.contributions {
        let _ = writeln!(out, "    {:<20} {:>10}  {:+}", c.indicator.label(), format_value(c.value), c.vote);
    }
}

/// Results table for the terminal; `details` adds one line per rule check.
pub fn render(session: &ScreeningSession, details: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{:<10} {:>9} {:>6}  FITS", "TICKER", "SATISFIED", "RATIO");
    for verdict in &session.verdicts {
        let ratio = verdict
            .ratio()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<10} {:>9} {:>6}  {}",
            verdict.ticker,
            format!("{}/{}", verdict.satisfied, verdict.effective),
            ratio,
            if verdict.fits_strategy { "✅" } else { "❌" }
        );
        if details {
            verdict_details(&mut out, verdict);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{} of {} tickers fit the strategy", session.fits_count(), session.verdicts.len());

    if !session.warnings.is_empty() {
        let _ = writeln!(out, "Skipped {} ticker(s):", session.warnings.len());
        for warning in &session.warnings {
            let _ = writeln!(out, "    {}: {}", warning.ticker, warning.message);
        }
    }

    if let Some(signal) = &session.macro_signal {
        macro_section(&mut out, signal);
    }

    out
}
