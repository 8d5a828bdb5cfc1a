use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::time::Duration;
use streamta_core::{Engine, IndicatorSpec};
use streamta_data::{Bar, Timeframe};

fn generate_bars(count: usize) -> Vec<Bar> {
    let tf = Timeframe::parse("1m").unwrap();
    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0;
    for i in 0..count {
        price += (i as f64 * 0.01).sin() * 2.0;
        bars.push(
            Bar::new(
                i as i64 * 60_000,
                price,
                price + 1.0,
                price - 1.0,
                price + 0.5,
                10_000.0 + i as f64 * 100.0,
                tf.clone(),
            )
            .unwrap(),
        );
    }
    bars
}

fn spec(type_tag: &str, params: &[(&str, f64)]) -> IndicatorSpec {
    IndicatorSpec {
        type_tag: type_tag.to_string(),
        timeframe: "1m".to_string(),
        params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

fn bench_individual_indicators(c: &mut Criterion) {
    let bars = generate_bars(1000);
    let mut group = c.benchmark_group("individual_indicators");
    group.measurement_time(Duration::from_secs(10));

    for tag in ["sma", "ema", "rsi", "macd", "boll", "adx", "psar"] {
        group.bench_function(tag, |b| {
            let mut specs = HashMap::new();
            specs.insert("under_test".to_string(), spec(tag, &[]));
            let mut engine = Engine::new();
            engine.register_requirements(&specs, None).unwrap();
            let mut idx = 0;
            b.iter(|| {
                engine.update(black_box(&bars[idx % bars.len()])).unwrap();
                idx += 1;
                black_box(engine.snapshot())
            });
        });
    }

    group.finish();
}

fn bench_engine_update_scaling(c: &mut Criterion) {
    let bars = generate_bars(100);
    let mut group = c.benchmark_group("engine_update_scaling");
    group.measurement_time(Duration::from_secs(10));

    for num_indicators in [5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(num_indicators), num_indicators, |b, &num| {
            let mut specs = HashMap::new();
            let tags = ["sma", "ema", "rsi", "macd", "boll", "adx", "psar"];
            for i in 0..num {
                specs.insert(format!("ind_{i}"), spec(tags[i % tags.len()], &[]));
            }
            let mut engine = Engine::new();
            engine.register_requirements(&specs, None).unwrap();

            let mut idx = 0;
            b.iter(|| {
                engine.update(black_box(&bars[idx % bars.len()])).unwrap();
                idx += 1;
                black_box(engine.snapshot())
            });
        });
    }

    group.finish();
}

fn bench_snapshot_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_retrieval");

    let mut specs = HashMap::new();
    for i in 0..20 {
        specs.insert(format!("sma_{i}"), spec("sma", &[("period", 20.0)]));
    }
    let mut engine = Engine::new();
    engine.register_requirements(&specs, None).unwrap();

    for bar in generate_bars(100) {
        engine.update(&bar).unwrap();
    }

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(engine.snapshot()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_individual_indicators,
    bench_engine_update_scaling,
    bench_snapshot_retrieval
);
criterion_main!(benches);
