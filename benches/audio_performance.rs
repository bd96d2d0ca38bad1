//! Audio performance benchmarks.
//!
//! Validates that circuit ticking and voice-manager throughput meet
//! real-time budgets at common sample rates and buffer sizes.
//!
//! ```text
//! time_budget = buffer_size / sample_rate
//! ```
//!
//! | Sample Rate | Buffer 64  | Buffer 128 | Buffer 256 | Buffer 512 |
//! |-------------|------------|------------|------------|------------|
//! | 44.1 kHz    | 1.45 ms    | 2.90 ms    | 5.80 ms    | 11.61 ms   |
//! | 48 kHz      | 1.33 ms    | 2.67 ms    | 5.33 ms    | 10.67 ms   |
//! | 96 kHz      | 0.67 ms    | 1.33 ms    | 2.67 ms    | 5.33 ms    |
//! | 192 kHz     | 0.33 ms    | 0.67 ms    | 1.33 ms    | 2.67 ms    |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use voxwright::prelude::*;

const SAMPLE_RATES: [f64; 4] = [44100.0, 48000.0, 96000.0, 192000.0];
const BUFFER_SIZES: [usize; 4] = [64, 128, 256, 512];
const VOICE_COUNTS: [usize; 5] = [1, 4, 8, 16, 32];

/// VCO -> SVF -> output circuit, mirroring a minimal subtractive voice.
fn create_voice_circuit(sample_rate: f64, buffer_size: usize) -> Circuit {
    let factory = builtin_factory(sample_rate);
    let mut circuit = Circuit::new(sample_rate, 120.0, buffer_size);

    let osc = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("oscillator.basic").unwrap()).unwrap();
    let filter = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("filter.svf").unwrap()).unwrap();
    let env = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("envelope.adsr").unwrap()).unwrap();
    let gain = circuit.add_unit_from_factory(&factory, factory.class_id_for_name("math.gain").unwrap()).unwrap();

    circuit.connect(osc, 0, filter, 0, EdgeKind::Forward).unwrap();
    circuit.connect(filter, 0, gain, 0, EdgeKind::Forward).unwrap();
    circuit.connect(env, 0, gain, 1, EdgeKind::Forward).unwrap();
    circuit.connect(gain, 0, circuit.output_unit(), 0, EdgeKind::Forward).unwrap();
    circuit.connect(gain, 0, circuit.output_unit(), 1, EdgeKind::Forward).unwrap();

    circuit
}

fn bench_circuit_tick_by_sample_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit/tick_by_sample_rate");

    for sample_rate in SAMPLE_RATES {
        let sr_name = format!("{}kHz", sample_rate as u32 / 1000);
        group.throughput(Throughput::Elements(128));
        group.bench_with_input(BenchmarkId::new("tick_128", &sr_name), &sample_rate, |b, &sr| {
            let mut circuit = create_voice_circuit(sr, 128);
            circuit.note_on(60, 100);
            b.iter(|| black_box(circuit.tick(128)));
        });
    }

    group.finish();
}

fn bench_circuit_tick_by_buffer_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit/tick_by_buffer_size");

    let sample_rate = 48000.0;
    for buffer_size in BUFFER_SIZES {
        let time_budget_us = (buffer_size as f64 / sample_rate) * 1_000_000.0;
        group.throughput(Throughput::Elements(buffer_size as u64));
        group.bench_with_input(BenchmarkId::new("tick", buffer_size), &buffer_size, |b, &n| {
            let mut circuit = create_voice_circuit(sample_rate, n);
            circuit.note_on(60, 100);
            b.iter(|| black_box(circuit.tick(n)));
        });
        eprintln!("  48kHz @ {buffer_size} samples: budget = {time_budget_us:.2}us");
    }

    group.finish();
}

fn bench_voice_manager_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("voice_manager/scaling");

    let sample_rate = 48000.0;
    let buffer_size = 256;

    for &num_voices in &VOICE_COUNTS {
        group.throughput(Throughput::Elements(buffer_size as u64));
        group.bench_with_input(BenchmarkId::new("tick_256", num_voices), &num_voices, |b, &voices| {
            let prototype = create_voice_circuit(sample_rate, buffer_size);
            let mut mgr = VoiceManager::new(prototype, voices);
            let queue = CommandQueue::new();
            let factory = builtin_factory(sample_rate);

            for i in 0..voices {
                mgr.note_on(60 + (i as u8 % 24), 100);
            }

            let mut left = vec![0.0f64; buffer_size];
            let mut right = vec![0.0f64; buffer_size];

            b.iter(|| {
                mgr.tick(&queue, &factory, buffer_size, black_box(&mut left), black_box(&mut right));
            });
        });
    }

    group.finish();
}

fn bench_voice_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("voice_manager/allocation");

    let sample_rate = 48000.0;
    for &num_voices in &VOICE_COUNTS {
        group.bench_with_input(BenchmarkId::new("note_on_off", num_voices), &num_voices, |b, &voices| {
            let prototype = create_voice_circuit(sample_rate, 128);
            let mut mgr = VoiceManager::new(prototype, voices);

            b.iter(|| {
                mgr.note_on(black_box(60), black_box(100));
                mgr.note_off(black_box(60), black_box(0));
            });
        });
    }

    group.finish();
}

fn bench_throughput_one_second(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    let sample_rate = 48000.0;
    let buffer_size = 256;
    let buffers_per_second = (sample_rate / buffer_size as f64).ceil() as usize;

    group.throughput(Throughput::Elements(sample_rate as u64));
    group.bench_function("single_voice_1sec", |b| {
        let mut circuit = create_voice_circuit(sample_rate, buffer_size);
        circuit.note_on(60, 100);
        b.iter(|| {
            for _ in 0..buffers_per_second {
                black_box(circuit.tick(buffer_size));
            }
        });
    });

    group.throughput(Throughput::Elements(sample_rate as u64));
    group.bench_function("poly8_1sec", |b| {
        let prototype = create_voice_circuit(sample_rate, buffer_size);
        let mut mgr = VoiceManager::new(prototype, 8);
        let queue = CommandQueue::new();
        let factory = builtin_factory(sample_rate);
        for i in 0..8 {
            mgr.note_on(60 + i as u8, 100);
        }
        let mut left = vec![0.0f64; buffer_size];
        let mut right = vec![0.0f64; buffer_size];

        b.iter(|| {
            for _ in 0..buffers_per_second {
                mgr.tick(&queue, &factory, buffer_size, black_box(&mut left), black_box(&mut right));
            }
        });
    });

    group.finish();
}

criterion_group!(
    circuit_benches,
    bench_circuit_tick_by_sample_rate,
    bench_circuit_tick_by_buffer_size,
);

criterion_group!(voice_manager_benches, bench_voice_manager_scaling, bench_voice_allocation,);

criterion_group!(throughput_benches, bench_throughput_one_second,);

criterion_main!(circuit_benches, voice_manager_benches, throughput_benches);
