//! screener: score stocks against a fundamentals rule set and report a macro signal.
//!
//! Usage:
//!   screener KO PEP JNJ
//!   screener --universe dividend_staples --rules strict --details
//!   screener --rules my_rules.json --missing-policy fail --csv results.csv
//!   screener KO PG --email investor@example.com

mod config;
mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::ScreenerConfig;
use fundamental_scorer::{FundamentalsScorer, MissingPolicy, PassCriterion, RuleSet};
use macro_signal::{LabelTable, MacroRuleSet, MacroSignalScorer, MissingIndicatorPolicy};
use market_data_client::{AlphaVantageClient, FredClient, OverlayMacroProvider, StaticMacroProvider};
use notification_service::{NotificationService, ResultsEmail};
use screener_core::MacroProvider;
use screener_orchestrator::{parse_tickers, write_csv, Screener, ScreeningSession, StockUniverse};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_LOG_FILTER: &str =
    "screener=info,fundamental_scorer=info,macro_signal=info,notification_service=info,market_data_client=warn";

#[derive(Parser, Debug)]
#[command(name = "screener", author, version, about = "Fundamentals stock screener with a macro signal")]
struct Cli {
    /// Tickers to screen (falls back to SCREENER_TICKERS)
    tickers: Vec<String>,

    /// Built-in ticker list: dividend_staples or blue_chips
    #[arg(long, conflicts_with = "tickers")]
    universe: Option<String>,

    /// Rule set preset (strict, relaxed, extended) or path to a JSON rule set
    #[arg(long)]
    rules: Option<String>,

    /// Default policy for missing metrics: pass, fail or neutral
    #[arg(long)]
    missing_policy: Option<String>,

    /// Fit when at least this many rules are satisfied
    #[arg(long, conflicts_with = "all_rules")]
    min_satisfied: Option<usize>,

    /// Fit only when every effective rule is satisfied
    #[arg(long)]
    all_rules: bool,

    /// A ticker with no checkable rules does not fit
    #[arg(long)]
    no_vacuous_pass: bool,

    /// Skip the macro signal
    #[arg(long)]
    no_macro: bool,

    /// Macro label table: four_tier, five_tier or cautious
    #[arg(long)]
    labels: Option<String>,

    /// Missing macro indicators: exclude or penalize
    #[arg(long)]
    macro_missing: Option<String>,

    /// Write results to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Email the results to this address (repeatable)
    #[arg(long)]
    email: Vec<String>,

    /// Email the results to NOTIFICATION_EMAIL_TO
    #[arg(long)]
    notify: bool,

    /// Alpha Vantage requests per minute
    #[arg(long)]
    rate_limit: Option<usize>,

    /// Show every rule check per ticker
    #[arg(long)]
    details: bool,

    /// JSON log output
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn resolve_tickers(cli: &Cli, config: &ScreenerConfig) -> Result<Vec<String>> {
    if let Some(name) = &cli.universe {
        let universe = StockUniverse::from_name(name)
            .with_context(|| format!("Unknown universe: {} (expected dividend_staples or blue_chips)", name))?;
        return Ok(universe.get_symbols());
    }
    if !cli.tickers.is_empty() {
        return Ok(parse_tickers(&cli.tickers.join(" ")));
    }
    Ok(config.tickers.clone())
}

/// Rule set from `--rules`/SCREENER_RULESET, with CLI policy flags applied on top.
fn resolve_rule_set(cli: &Cli, config: &ScreenerConfig) -> Result<RuleSet> {
    let source = cli.rules.as_deref().unwrap_or(&config.rule_set);
    let rule_set = RuleSet::load(source).with_context(|| format!("Failed to load rule set '{}'", source))?;

    let mut policy = rule_set.policy;
    let missing: Option<MissingPolicy> = match &cli.missing_policy {
        Some(raw) => Some(raw.parse()?),
        None => config.missing_policy,
    };
    if let Some(missing) = missing {
        policy.missing = missing;
    }
    if cli.all_rules {
        policy.criterion = PassCriterion::AllRules;
    }
    if let Some(n) = cli.min_satisfied {
        policy.criterion = PassCriterion::MinSatisfied(n);
    }
    if cli.no_vacuous_pass {
        policy.vacuous_pass = false;
    }

    Ok(rule_set.with_policy(policy))
}

fn resolve_macro_rules(cli: &Cli, config: &ScreenerConfig) -> Result<MacroRuleSet> {
    let labels = LabelTable::preset(cli.labels.as_deref().unwrap_or(&config.label_table))?;
    let missing: MissingIndicatorPolicy = match &cli.macro_missing {
        Some(raw) => raw.parse()?,
        None => config.macro_missing,
    };
    Ok(MacroRuleSet::default().with_labels(labels).with_missing(missing))
}

fn macro_provider(config: &ScreenerConfig) -> Box<dyn MacroProvider> {
    match &config.fred_api_key {
        Some(key) => Box::new(OverlayMacroProvider::new(
            Box::new(FredClient::new(key.clone())),
            config.macro_values,
        )),
        None => {
            tracing::info!("FRED_API_KEY not set, using configured macro values only");
            Box::new(StaticMacroProvider::new(config.macro_values))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = ScreenerConfig::from_env()?;

    let tickers = resolve_tickers(&cli, &config)?;
    if tickers.is_empty() {
        bail!("No tickers given (pass them as arguments, use --universe, or set SCREENER_TICKERS)");
    }

    let scorer = FundamentalsScorer::new(resolve_rule_set(&cli, &config)?)?;
    let macro_scorer = MacroSignalScorer::new(resolve_macro_rules(&cli, &config)?)?;

    let api_key = config
        .alpha_vantage_api_key
        .clone()
        .context("ALPHA_VANTAGE_API_KEY not set")?;
    let provider = AlphaVantageClient::new(api_key).with_rate_limit(cli.rate_limit.unwrap_or(config.requests_per_minute));

    let screener = Screener::new(Arc::new(provider), scorer);
    let mut session = screener.screen_batch(&tickers, ScreeningSession::new()).await;

    if !cli.no_macro {
        let provider = macro_provider(&config);
        session = screener.attach_macro(provider.as_ref(), &macro_scorer, session).await;
    }

    print!("{}", report::render(&session, cli.details));

    if let Some(path) = &cli.csv {
        let file = std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&session.verdicts, file)?;
        tracing::info!("Wrote {} rows to {}", session.verdicts.len(), path.display());
    }

    let recipients = if !cli.email.is_empty() {
        cli.email.clone()
    } else if cli.notify {
        config.notification.recipients.clone()
    } else {
        Vec::new()
    };

    if !recipients.is_empty() {
        let email = ResultsEmail::from_session(&session)?;
        NotificationService::new(&config.notification)
            .send_results(&email, &recipients)
            .await?;
    } else if cli.notify {
        bail!("--notify given but NOTIFICATION_EMAIL_TO is empty");
    }

    Ok(())
}
