use std::collections::BTreeMap;
use std::hint::black_box;
use std::sync::Arc;

use allocator_rs::kyc::QuestionnaireResponse;
use allocator_rs::market::returns::month_end;
use allocator_rs::market::AssetCategory;
use allocator_rs::market::AssetMeta;
use allocator_rs::market::AssetSeries;
use allocator_rs::market::MarketConfig;
use allocator_rs::market::ReturnModelBuilder;
use allocator_rs::market::RiskFreeSeries;
use allocator_rs::portfolio::OptimizationRequest;
use allocator_rs::portfolio::StrategyKind;
use allocator_rs::EngineConfig;
use allocator_rs::PortfolioEngine;
use chrono::Months;
use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

const CATEGORIES: [AssetCategory; 4] = [
  AssetCategory::Equity,
  AssetCategory::Bond,
  AssetCategory::Commodity,
  AssetCategory::Reit,
];

fn universe(n: usize, months: u32) -> BTreeMap<String, AssetSeries> {
  let mut rng = StdRng::seed_from_u64(42);
  let start = NaiveDate::from_ymd_opt(2005, 1, 31).unwrap();
  let mut out = BTreeMap::new();
  for i in 0..n {
    let category = CATEGORIES[i % CATEGORIES.len()];
    let normal = Normal::new(0.004 + 0.001 * (i % 5) as f64, 0.02 + 0.01 * (i % 4) as f64).unwrap();
    let mut price = 100.0;
    let points = (0..months)
      .map(|m| {
        let date = month_end(start.checked_add_months(Months::new(m)).unwrap());
        let point = (date, price);
        price *= normal.sample(&mut rng).exp();
        point
      })
      .collect();
    let name = format!("A{i:02}");
    let meta = AssetMeta::new(name.clone(), category, "IL", "ILS");
    out.insert(name, AssetSeries::new(meta, points).unwrap());
  }
  out
}

fn bench_build(c: &mut Criterion) {
  let mut group = c.benchmark_group("ReturnModelBuilder");
  for n in [5, 20] {
    let assets = universe(n, 240);
    group.bench_with_input(BenchmarkId::from_parameter(n), &assets, |b, assets| {
      let builder = ReturnModelBuilder::new(MarketConfig::default());
      b.iter(|| {
        black_box(
          builder
            .build(assets, &BTreeMap::new(), RiskFreeSeries::constant(0.03))
            .unwrap(),
        )
      });
    });
  }
  group.finish();
}

fn bench_optimize(c: &mut Criterion) {
  let mut group = c.benchmark_group("PortfolioEngine::run");
  group.sample_size(20);

  let market = Arc::new(
    ReturnModelBuilder::default()
      .build(&universe(10, 240), &BTreeMap::new(), RiskFreeSeries::constant(0.03))
      .unwrap(),
  );
  let request = OptimizationRequest::new(
    QuestionnaireResponse::new(60, 60, 60, 60, 60, 60).unwrap(),
    100_000.0,
    10.0,
  );

  for strategy in [StrategyKind::Sortino, StrategyKind::Utility, StrategyKind::MaxSharpe] {
    let config = EngineConfig {
      strategy,
      ..Default::default()
    };
    let engine = PortfolioEngine::new(config, market.clone()).unwrap();
    group.bench_function(strategy.to_string(), |b| {
      b.iter(|| black_box(engine.run(&request).unwrap()))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_build, bench_optimize);
criterion_main!(benches);
