//! Controller and history benchmarks
//!
//! Run with: cargo bench --bench locomotion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ragdoll_netcore::config::{MovementConfig, SimConfig};
use ragdoll_netcore::game::body::PhysicsBody;
use ragdoll_netcore::game::history::RingHistory;
use ragdoll_netcore::game::locomotion::LocomotionController;
use ragdoll_netcore::game::rig::SimpleRig;
use ragdoll_netcore::metrics::Metrics;
use ragdoll_netcore::net::protocol::{BodyState, InputCommand};
use ragdoll_netcore::net::reconcile::{resimulate, ReplayBuffers};

/// Seeded sequence of varied commands
fn scripted_inputs(count: u64) -> Vec<InputCommand> {
    let mut rng = StdRng::seed_from_u64(7);
    (1..=count)
        .map(|tick| InputCommand {
            move_axis: Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(0.0..1.0)),
            punch_right: rng.gen_bool(0.1),
            reach_left: if rng.gen_bool(0.3) { 1.0 } else { 0.0 },
            mouse_y: rng.gen_range(-2.0..2.0),
            jump: if rng.gen_bool(0.02) { 1.0 } else { 0.0 },
            ..InputCommand::new(tick)
        })
        .collect()
}

fn bench_controller_step(c: &mut Criterion) {
    let controller = LocomotionController::new(MovementConfig::default(), 60);
    let inputs = scripted_inputs(600);
    let mut group = c.benchmark_group("controller");
    group.sample_size(50);

    group.throughput(Throughput::Elements(1));
    group.bench_function("step", |b| {
        let rig = SimpleRig::default();
        let snapshot = rig.snapshot(controller.config().balance_height);
        let mut state = controller.spawn_state();
        let mut i = 0;
        b.iter(|| {
            let frame = controller.step(&mut state, black_box(&snapshot), &inputs[i % inputs.len()]);
            i += 1;
            black_box(frame)
        })
    });

    group.throughput(Throughput::Elements(inputs.len() as u64));
    group.bench_function("tick_600_on_rig", |b| {
        b.iter(|| {
            let mut state = controller.spawn_state();
            let mut rig = SimpleRig::default();
            for input in &inputs {
                black_box(controller.tick(&mut state, &mut rig, input));
            }
        })
    });

    group.finish();
}

fn bench_ring_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_history");
    group.sample_size(50);

    for capacity in [64usize, 1024, 8192] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("write_get", capacity),
            &capacity,
            |b, &capacity| {
                let mut history = RingHistory::new(capacity);
                b.iter(|| {
                    for tick in 0..capacity as u64 {
                        history.write(tick, BodyState {
                            tick,
                            position: Vec3::splat(tick as f32),
                            ..BodyState::default()
                        });
                    }
                    for tick in 0..capacity as u64 {
                        black_box(history.get(tick));
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_resimulate(c: &mut Criterion) {
    let config = SimConfig::default();
    let controller = LocomotionController::new(config.movement.clone(), config.tick_rate);
    let inputs_list = scripted_inputs(120);
    let mut group = c.benchmark_group("reconcile");
    group.sample_size(30);

    for depth in [4u64, 16, 60] {
        group.throughput(Throughput::Elements(depth));
        group.bench_with_input(BenchmarkId::new("resimulate", depth), &depth, |b, &depth| {
            let mut inputs = RingHistory::new(config.history_capacity);
            let mut locomotion = RingHistory::new(config.history_capacity);
            let mut predicted = RingHistory::new(config.history_capacity);
            let mut checkpoints = RingHistory::new(config.history_capacity);
            let mut state = controller.spawn_state();
            let mut rig = SimpleRig::default();
            for input in &inputs_list {
                inputs.write(input.tick, *input);
                predicted.write(input.tick, controller.tick(&mut state, &mut rig, input));
                locomotion.write(input.tick, state.clone());
                checkpoints.write(input.tick, rig.checkpoint());
            }
            let current = inputs_list.len() as u64;
            let from = current - depth;
            let authoritative = predicted.get(from).copied().unwrap_or_default();

            b.iter(|| {
                let mut body = rig.clone();
                black_box(resimulate(
                    &controller,
                    &mut body,
                    &authoritative,
                    current,
                    ReplayBuffers {
                        inputs: &inputs,
                        locomotion: &mut locomotion,
                        predicted: &mut predicted,
                        checkpoints: &mut checkpoints,
                    },
                ))
            })
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let metrics = Metrics::new();
    for _ in 0..1000 {
        metrics.record_tick_time(std::time::Duration::from_micros(150));
    }
    c.bench_function("metrics_to_prometheus", |b| {
        b.iter(|| black_box(metrics.to_prometheus()))
    });
}

criterion_group!(
    benches,
    bench_controller_step,
    bench_ring_history,
    bench_resimulate,
    bench_metrics
);
criterion_main!(benches);
