//! Benchmarks for mask morphology and hole filling

use cloudmask_algorithms::morphology::{dilate_mask, erode_mask, fill_holes, StructuringElement};
use cloudmask_core::{GeoTransform, Raster};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;

/// Scattered blobs covering roughly a third of the grid
fn create_test_mask(size: usize) -> Array2<bool> {
    Array2::from_shape_fn((size, size), |(r, c)| ((r / 16) * 7 + (c / 16) * 13) % 3 == 0)
}

fn create_test_raster(size: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 30.0, -30.0));
    for row in 0..size {
        for col in 0..size {
            let v = ((row * 7 + col * 13) % 256) as f64 / 255.0;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn bench_dilate(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/dilate_mask");
    for (name, se) in [("square3", StructuringElement::Square(3)), ("disk6", StructuringElement::Disk(6))] {
        for size in [256, 1024] {
            let mask = create_test_mask(size);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| dilate_mask(black_box(&mask), &se).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_erode(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/erode_mask");
    let se = StructuringElement::Disk(3);
    for size in [256, 1024] {
        let mask = create_test_mask(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| erode_mask(black_box(&mask), &se).unwrap())
        });
    }
    group.finish();
}

fn bench_fill_holes(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/fill_holes");
    for size in [256, 1024] {
        let raster = create_test_raster(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| fill_holes(black_box(&raster)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dilate, bench_erode, bench_fill_holes);
criterion_main!(benches);
