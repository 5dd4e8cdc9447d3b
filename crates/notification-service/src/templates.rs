use chrono::{DateTime, Utc};
use screener_core::{MacroSignal, Verdict};

pub struct EmailTemplate;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl EmailTemplate {
    pub fn render(verdicts: &[Verdict], macro_signal: Option<&MacroSignal>, generated_at: DateTime<Utc>) -> String {
        let rows: String = verdicts
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let stripe = if i % 2 == 1 { r#" style="background:#f8fafc;""# } else { "" };
                let (color, mark) = if v.fits_strategy {
                    ("#22c55e", "✅")
                } else {
                    ("#ef4444", "❌")
                };
                format!(
                    r#"<tr{stripe}><td style="padding:8px 12px;font-weight:600;">{ticker}</td><td style="padding:8px 12px;">{sat}/{eff}</td><td style="padding:8px 12px;color:{color};">{mark}</td></tr>"#,
                    ticker = escape(&v.ticker),
                    sat = v.satisfied,
                    eff = v.effective,
                )
            })
            .collect::<Vec<_>>()
            .join("\n  ");

        let macro_html = macro_signal
            .map(|signal| {
                if !signal.has_data() {
                    return r#"<div style="padding:12px 20px;border-top:1px solid #e2e8f0;color:#94a3b8;">Macro signal: no macro data</div>"#.to_string();
                }
                format!(
                    r#"<div style="padding:12px 20px;border-top:1px solid #e2e8f0;color:#334155;">Macro signal: <strong>{label}</strong> (score {score:+}, {scored} indicators)</div>"#,
                    label = escape(&signal.label),
                    score = signal.score,
                    scored = signal.scored,
                )
            })
            .unwrap_or_default();

        let fits = verdicts.iter().filter(|v| v.fits_strategy).count();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;">
      <tr><td>
        <div style="background:#1e293b;color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">Screening Results: {fits}/{total} fit the strategy</div>
        <table style="width:100%;border-collapse:collapse;">
  <tr><th style="padding:8px 12px;text-align:left;color:#94a3b8;">Ticker</th><th style="padding:8px 12px;text-align:left;color:#94a3b8;">Rules met</th><th style="padding:8px 12px;text-align:left;color:#94a3b8;">Fits</th></tr>
  {rows}
        </table>
        {macro_html}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">Full results attached as CSV.<br>Generated at {ts} UTC</p>
      </td></tr>
    </table>
  </td></tr>
</table>
</body>
</html>"#,
            total = verdicts.len(),
            ts = generated_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}
