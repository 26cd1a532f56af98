use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use allocator_rs::kyc::QuestionnaireResponse;
use allocator_rs::market::returns::month_end;
use allocator_rs::market::AssetCategory;
use allocator_rs::market::AssetMeta;
use allocator_rs::market::AssetSeries;
use allocator_rs::market::FxSeries;
use allocator_rs::market::ModelCache;
use allocator_rs::market::RiskClass;
use allocator_rs::market::RiskFreeSeries;
use allocator_rs::portfolio::AllocationOutcome;
use allocator_rs::portfolio::OptimizationRequest;
use allocator_rs::portfolio::OptimizationResult;
use allocator_rs::portfolio::StrategyKind;
use allocator_rs::EngineConfig;
use allocator_rs::PortfolioEngine;
use anyhow::Context;
use chrono::Months;
use chrono::NaiveDate;
use clap::Parser;
use prettytable::row;
use prettytable::Table;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "allocator")]
#[command(about = "Risk-profiled allocation over a synthetic multi-currency universe")]
struct Cli {
  /// Engine configuration (TOML); defaults apply when omitted
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Objective: sortino, utility or max-sharpe
  #[arg(short, long)]
  strategy: Option<String>,

  /// Answers for horizon, loss tolerance, experience, financial, goal, sleep
  #[arg(short, long, num_args = 6, default_values_t = [60, 60, 60, 60, 60, 60])]
  answers: Vec<i64>,

  /// Amount to invest, in the base currency
  #[arg(long, default_value_t = 100_000.0)]
  amount: f64,

  /// Investment horizon in years
  #[arg(long, default_value_t = 10.0)]
  years: f64,

  /// Months of synthetic history
  #[arg(long, default_value_t = 180)]
  months: u32,

  /// Seed of the synthetic universe
  #[arg(long, default_value_t = 7)]
  seed: u64,
}

/// Synthetic instrument: name, category, currency, monthly drift, monthly vol.
const UNIVERSE: [(&str, AssetCategory, &str, f64, f64); 7] = [
  ("TA125", AssetCategory::Equity, "ILS", 0.007, 0.045),
  ("SPY", AssetCategory::Equity, "USD", 0.008, 0.043),
  ("QQQ", AssetCategory::Equity, "USD", 0.010, 0.060),
  ("ILGOV", AssetCategory::Bond, "ILS", 0.002, 0.010),
  ("AGG", AssetCategory::Bond, "USD", 0.0025, 0.012),
  ("GLD", AssetCategory::Commodity, "USD", 0.004, 0.040),
  ("VNQ", AssetCategory::Reit, "USD", 0.006, 0.055),
];

fn price_path(
  rng: &mut StdRng,
  start: NaiveDate,
  months: u32,
  drift: f64,
  vol: f64,
) -> anyhow::Result<Vec<(NaiveDate, f64)>> {
  let step = Normal::new(drift, vol)?;
  let mut price = 100.0;
  let mut out = Vec::with_capacity(months as usize);
  for m in 0..months {
    let date = start.checked_add_months(Months::new(m)).context("date overflow")?;
    out.push((month_end(date), price));
    price *= step.sample(rng).exp();
  }
  Ok(out)
}

fn synthetic_market(
  months: u32,
  seed: u64,
) -> anyhow::Result<(BTreeMap<String, AssetSeries>, BTreeMap<String, FxSeries>)> {
  let mut rng = StdRng::seed_from_u64(seed);
  let start = NaiveDate::from_ymd_opt(2010, 1, 31).context("invalid start date")?;

  let mut assets = BTreeMap::new();
  for (name, category, currency, drift, vol) in UNIVERSE {
    let meta = if name == "QQQ" {
      AssetMeta::new(name, category, "US", currency).with_risk_class(RiskClass::HighRiskEquity)
    } else {
      AssetMeta::new(name, category, if currency == "ILS" { "IL" } else { "US" }, currency)
    };
    let path = price_path(&mut rng, start, months, drift, vol)?;
    assets.insert(name.to_string(), AssetSeries::new(meta, path)?);
  }

  let mut fx = BTreeMap::new();
  let usd = price_path(&mut rng, start, months, 0.0, 0.02)?
    .into_iter()
    .map(|(d, p)| (d, 3.6 * p / 100.0))
    .collect();
  fx.insert("USD".to_string(), FxSeries::new("USD", "ILS", usd)?);
  Ok((assets, fx))
}

fn print_profile(result: &OptimizationResult) {
  let mut table = Table::new();
  table.set_titles(row!["Category", "Score", "Strategy", "Converged", "Solve (ms)"]);
  table.add_row(row![
    result.category,
    format!("{:.1}", result.composite_score),
    result.strategy,
    match result.fallback_reason {
      Some(reason) => format!("no ({reason})"),
      None => "yes".to_string(),
    },
    format!("{:.1}", result.solve_time_ms)
  ]);
  table.printstd();
}

fn print_allocation(result: &OptimizationResult) {
  let mut table = Table::new();
  table.set_titles(row!["Asset", "Weight", "Amount", "Risk share"]);
  for (name, w) in &result.weights {
    let share = result
      .risk_contributions
      .get(name)
      .map(|c| c.percentage)
      .unwrap_or_default();
    table.add_row(row![
      name,
      format!("{:.2}%", w * 100.0),
      format!("{:.2} {}", result.amounts[name], result.base_currency),
      format!("{:.2}%", share * 100.0)
    ]);
  }
  table.printstd();
}

fn print_metrics(result: &OptimizationResult) {
  let m = &result.metrics;
  let mut table = Table::new();
  table.set_titles(row!["Metric", "Value"]);
  table.add_row(row!["Expected return", format!("{:.2}%", result.expected_return * 100.0)]);
  table.add_row(row!["Volatility", format!("{:.2}%", result.volatility * 100.0)]);
  table.add_row(row!["Sharpe", format!("{:.3}", result.sharpe)]);
  table.add_row(row!["Sortino", format!("{:.3}", m.sortino)]);
  table.add_row(row!["CVaR 95", format!("{:.2}%", m.cvar_95 * 100.0)]);
  table.add_row(row!["Max drawdown", format!("{:.2}%", m.max_drawdown * 100.0)]);
  table.add_row(row!["Calmar", format!("{:.3}", m.calmar)]);
  table.add_row(row!["Win rate", format!("{:.1}%", m.win_rate * 100.0)]);
  table.add_row(row!["HHI", format!("{:.3}", result.concentration_hhi)]);
  table.add_row(row![
    "Backtest value",
    format!(
      "{:.2} ({:+.1}% over {:.1}y)",
      result.history.final_value, result.history.total_return_pct, result.history.years
    )
  ]);
  table.printstd();
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => EngineConfig::load(path)?,
    None => EngineConfig::default(),
  };
  if let Some(strategy) = &cli.strategy {
    config.strategy = StrategyKind::from_str(strategy);
  }

  let [h, l, e, f, g, s] = <[i64; 6]>::try_from(cli.answers.as_slice())
    .context("exactly six answers are required")?;
  let responses = QuestionnaireResponse::new(h, l, e, f, g, s)?;

  let (assets, fx) = synthetic_market(cli.months, cli.seed)?;
  let cache = ModelCache::new(Duration::from_secs(config.cache_ttl_secs));
  let engine = PortfolioEngine::from_series(
    config,
    &cache,
    "synthetic",
    &assets,
    &fx,
    RiskFreeSeries::constant(0.035),
  )?;
  info!(assets = ?engine.market().asset_names(), "market model ready");

  let request = OptimizationRequest::new(responses, cli.amount, cli.years);
  match engine.run(&request)? {
    AllocationOutcome::Allocated(result) => {
      print_profile(&result);
      print_allocation(&result);
      print_metrics(&result);
    }
    AllocationOutcome::Blocked(blocked) => {
      println!(
        "Assessment blocked ({}, score {:.1}):",
        blocked.profile.category, blocked.profile.composite_score
      );
      for reason in &blocked.reasons {
        println!("  - {reason}");
      }
    }
  }

  Ok(())
}
