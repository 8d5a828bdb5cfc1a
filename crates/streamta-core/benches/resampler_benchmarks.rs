use criterion::{black_box, criterion_group, criterion_main, Criterion};
use streamta_core::OhlcvResampler;
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
                1_000.0,
                tf.clone(),
            )
            .unwrap(),
        );
    }
    bars
}

fn bench_resample_1m_to_1h(c: &mut Criterion) {
    let bars = generate_bars(10_000);
    c.bench_function("resample_1m_to_1h", |b| {
        b.iter(|| {
            let mut resampler =
                OhlcvResampler::new(Timeframe::parse("1m").unwrap(), Timeframe::parse("1h").unwrap()).unwrap();
            for bar in &bars {
                black_box(resampler.add(bar));
            }
            black_box(resampler.flush())
        });
    });
}

fn bench_resample_1m_to_1d(c: &mut Criterion) {
    let bars = generate_bars(10_000);
    c.bench_function("resample_1m_to_1d", |b| {
        b.iter(|| {
            let mut resampler =
                OhlcvResampler::new(Timeframe::parse("1m").unwrap(), Timeframe::parse("1d").unwrap()).unwrap();
            for bar in &bars {
                black_box(resampler.add(bar));
            }
            black_box(resampler.flush())
        });
    });
}

criterion_group!(benches, bench_resample_1m_to_1h, bench_resample_1m_to_1d);
criterion_main!(benches);
