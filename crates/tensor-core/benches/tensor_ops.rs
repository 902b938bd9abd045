// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for tensor operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tensor_core::{conv2d, depthwise_conv2d, quant, DType, Shape, Tensor};

fn ramp(shape: Shape) -> Tensor {
    let n = shape.num_elements();
    let data = (0..n).map(|i| (i % 17) as f32 * 0.01 - 0.08).collect();
    Tensor::from_vec(shape, data).expect("ramp shape")
}

fn bench_conv2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv2d");
    for &size in &[16usize, 32, 64] {
        let input = ramp(Shape::image(size, size, 16));
        let kernel = ramp(Shape::new(vec![3, 3, 16, 32]));
        let bias = Tensor::zeros(Shape::vector(32));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| conv2d(black_box(&input), &kernel, &bias, 1).expect("conv2d"))
        });
    }
    group.finish();
}

fn bench_depthwise(c: &mut Criterion) {
    let input = ramp(Shape::image(32, 32, 64));
    let kernel = ramp(Shape::new(vec![3, 3, 64]));
    let bias = Tensor::zeros(Shape::vector(64));
    c.bench_function("depthwise_conv2d/32x32x64", |b| {
        b.iter(|| depthwise_conv2d(black_box(&input), &kernel, &bias, 1).expect("depthwise"))
    });
}

fn bench_quant(c: &mut Criterion) {
    let weights = ramp(Shape::vector(1 << 16));
    let mut group = c.benchmark_group("encode");
    for dtype in [DType::F32, DType::F16, DType::I8] {
        group.bench_function(dtype.as_str(), |b| {
            b.iter(|| quant::encode(black_box(weights.as_slice()), dtype).expect("encode"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_conv2d, bench_depthwise, bench_quant);
criterion_main!(benches);
