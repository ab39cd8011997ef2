//! Clipping engine benchmarks.
//!
//! Key interpolation, the bounds clamp and frame rendering at common sizes.

use clip_cutter::clipping::{adjust_bounds, compute_interpolation, ClippingKey, ClippingRender};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Gradient test picture, packed RGB
fn create_test_frame(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 3) as usize];

    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = (x * 255 / width) as u8;
            data[idx + 1] = (y * 255 / height) as u8;
            data[idx + 2] = 128;
        }
    }

    data
}

fn keys(count: u32) -> Vec<ClippingKey> {
    (0..count)
        .map(|i| {
            ClippingKey::new(
                i * 25 + 1,
                640.0 + f64::from(i % 7) * 10.0,
                360.0 - f64::from(i % 5) * 8.0,
                0.5 + f64::from(i % 3) * 0.1,
                f64::from(i * 37 % 360),
            )
        })
        .collect()
}

fn bench_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");

    for count in [2u32, 32, 512] {
        let keys = keys(count);
        let last = keys.last().map_or(1, |k| k.frame);

        group.bench_with_input(BenchmarkId::from_parameter(count), &keys, |b, keys| {
            b.iter(|| compute_interpolation(black_box(last / 2 + 3), black_box(keys)));
        });
    }

    group.finish();
}

fn bench_adjust_bounds(c: &mut Criterion) {
    let key = ClippingKey::new(100, 1200.0, 80.0, 3.5, 45.0);

    c.bench_function("adjust_bounds", |b| {
        b.iter(|| adjust_bounds(black_box(key), 640, 360, 1280, 720));
    });
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.sample_size(20);

    let source = create_test_frame(1280, 720);
    let targets = [("320x180", 320, 180), ("640x360", 640, 360)];

    for (name, w, h) in targets {
        let render = ClippingRender::new((1280, 720), (w, h));
        let mut out = vec![0u8; render.output_size()];
        group.throughput(Throughput::Elements(u64::from(w * h)));

        let straight = ClippingKey::new(1, 640.0, 360.0, 1.0, 0.0);
        group.bench_with_input(BenchmarkId::new("straight", name), &straight, |b, key| {
            b.iter(|| render.render(black_box(key), &source, &mut out, false));
        });

        let rotated = adjust_bounds(ClippingKey::new(1, 640.0, 360.0, 1.0, 30.0), w, h, 1280, 720);
        group.bench_with_input(BenchmarkId::new("rotated", name), &rotated, |b, key| {
            b.iter(|| render.render(black_box(key), &source, &mut out, false));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_interpolation, bench_adjust_bounds, bench_render);
criterion_main!(benches);
