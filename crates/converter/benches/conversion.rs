// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for conversion attempts and artifact execution.

use converter::{
    lower, ArtifactInterpreter, ConversionConfig, Converter, RuntimeOps, SyntheticCalibration,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use model_ir::{backbone, synthetic_input, ArchitectureDescriptor, BackboneSpec};
use tensor_core::Shape;

fn descriptor() -> ArchitectureDescriptor {
    ArchitectureDescriptor::new(
        Shape::image(64, 64, 3),
        BackboneSpec {
            width: 8,
            ..BackboneSpec::default()
        },
        ArchitectureDescriptor::standard_head(32),
        20,
    )
    .expect("descriptor")
}

fn bench_attempts(c: &mut Criterion) {
    let graph = backbone::build(&descriptor(), "bench").expect("graph");
    let program = lower(&graph);
    let converter = Converter::default();
    let mut f16 = ConversionConfig::float16_calibrated();
    f16.calibration = Some(converter::CalibrationSettings { num_samples: 4 });

    let mut group = c.benchmark_group("attempt");
    for config in [f16, ConversionConfig::dynamic_range(), ConversionConfig::float32_builtins()] {
        group.bench_function(config.name.clone(), |b| {
            b.iter(|| {
                converter
                    .attempt(black_box(&program), &config, &mut SyntheticCalibration::new(0))
                    .expect("attempt")
            })
        });
    }
    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let d = descriptor();
    let graph = backbone::build(&d, "bench").expect("graph");
    let artifact = Converter::default()
        .attempt(&lower(&graph), &ConversionConfig::dynamic_range(), &mut SyntheticCalibration::new(0))
        .expect("attempt");
    let interp = ArtifactInterpreter::new(&artifact, &RuntimeOps::default()).expect("interpreter");
    let input = synthetic_input(d.input_shape(), 1);
    c.bench_function("invoke/int8-64x64", |b| {
        b.iter(|| interp.invoke(black_box(&input)).expect("invoke"))
    });
}

criterion_group!(benches, bench_attempts, bench_invoke);
criterion_main!(benches);
