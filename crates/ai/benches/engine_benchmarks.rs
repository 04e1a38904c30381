use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, NaiveDate};
use insight_ai::anomaly::{AnomalyConfig, Ensemble};
use insight_ai::forecast::{
    ForecastModelManager, ForecastParams, ForecastTarget, InMemoryModelStore, ModelKey, TrendSeasonalModel,
};
use insight_core::{CompanyId, EntityKey, Granularity, ProductId, TimeSeriesPoint, WarehouseId};
use std::sync::Arc;

fn daily_series(days: i64) -> Vec<TimeSeriesPoint> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    (0..days)
        .map(|i| {
            let weekend = if i % 7 >= 5 { 6.0 } else { 0.0 };
            TimeSeriesPoint::new(start + Duration::days(i), 10.0 + 0.05 * i as f64 + weekend)
        })
        .collect()
}

fn key() -> ModelKey {
    ModelKey::new(
        ForecastTarget::Demand,
        EntityKey::product(CompanyId::new(1), WarehouseId::new(5), ProductId::new(100)),
    )
}

fn bench_model_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_fit");

    for days in [30i64, 90, 365, 730].iter() {
        let series = daily_series(*days);
        group.throughput(Throughput::Elements(*days as u64));
        group.bench_with_input(BenchmarkId::new("trend_weekly", days), &series, |b, s| {
            let params = ForecastParams::default();
            b.iter(|| black_box(TrendSeasonalModel::fit(s, Granularity::Day, &params).unwrap()));
        });
    }

    group.finish();
}

fn bench_forecast_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("forecast_cache");
    let series = daily_series(365);
    let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    // Cold: every iteration trains into an empty store
    group.bench_function("train_and_forecast_30d", |b| {
        b.iter(|| {
            let mgr = ForecastModelManager::new(Arc::new(InMemoryModelStore::new()), ForecastParams::default());
            black_box(mgr.forecast(&key(), &series, Granularity::Day, 30, as_of).unwrap());
        });
    });

    // Warm: model is loaded from the store
    group.bench_function("reuse_and_forecast_30d", |b| {
        let mgr = ForecastModelManager::new(Arc::new(InMemoryModelStore::new()), ForecastParams::default());
        mgr.forecast(&key(), &series, Granularity::Day, 30, as_of).unwrap();
        b.iter(|| black_box(mgr.forecast(&key(), &series, Granularity::Day, 30, as_of).unwrap()));
    });

    group.finish();
}

fn bench_anomaly_ensemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("anomaly_ensemble");
    let ensemble = Ensemble::standard(&AnomalyConfig::default());

    for n in [50usize, 500, 5000].iter() {
        let values: Vec<f64> = (0..*n)
            .map(|i| if i % 97 == 13 { 900.0 } else { 20.0 + (i % 11) as f64 })
            .collect();
        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::new("evaluate", n), &values, |b, v| {
            b.iter(|| black_box(ensemble.evaluate(v)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_model_fit, bench_forecast_cache, bench_anomaly_ensemble);
criterion_main!(benches);
