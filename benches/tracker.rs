// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for tree building and completion detection.
//!
//! Run with: `cargo bench --bench tracker`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;

use dials::config::load_config;
use dials::{LegOptions, Tracker};

/// Operations with no continuations: create, run, retire.
fn bench_track(c: &mut Criterion) {
    let tracker = Tracker::default();
    tracker.on_operation_complete(|op| {
        black_box(op);
    });

    let mut group = c.benchmark_group("track");
    group.throughput(Throughput::Elements(1));

    group.bench_function("synchronous_root", |b| {
        b.iter(|| tracker.track("root", || black_box(2) + black_box(3)));
    });

    group.bench_function("untracked_wrap", |b| {
        b.iter(|| tracker.wrap(LegOptions::default(), || ()).run());
    });

    group.finish();
}

/// Wide trees: one root scheduling many continuations.
fn bench_fan_out(c: &mut Criterion) {
    let tracker = Tracker::default();
    let mut group = c.benchmark_group("fan_out");

    for width in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let pending = tracker.track("root", || {
                    (0..width)
                        .map(|_| tracker.wrap(LegOptions::new().name("child"), || ()))
                        .collect::<Vec<_>>()
                });
                for continuation in pending {
                    continuation.run();
                }
            });
        });
    }

    group.finish();
}

fn descend(tracker: &Tracker, depth: usize) {
    if depth == 0 {
        return;
    }
    tracker
        .wrap(LegOptions::default(), || descend(tracker, depth - 1))
        .run();
}

/// Deep trees: each continuation schedules the next.
fn bench_chain(c: &mut Criterion) {
    let tracker = Tracker::default();
    let mut group = c.benchmark_group("chain");

    for depth in [10usize, 100] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| tracker.track("root", || descend(&tracker, depth)));
        });
    }

    group.finish();
}

/// Fork with sticky cleanup, as a request integration would use it.
fn bench_fork_prune(c: &mut Criterion) {
    let tracker = Tracker::default();
    let mut group = c.benchmark_group("fork");
    group.throughput(Throughput::Elements(1));

    group.bench_function("success_failure_complete", |b| {
        b.iter(|| {
            let (on_success, _on_failure, on_complete) = tracker.track("request", || {
                tracker.fork(|fork| {
                    (
                        fork.wrap(LegOptions::new().name("onSuccess"), || ()),
                        fork.wrap(LegOptions::new().name("onFailure"), || ()),
                        fork.wrap(LegOptions::new().name("onComplete").sticky(true), || ()),
                    )
                })
            });
            on_success.run();
            on_complete.run();
        });
    });

    group.bench_function("abort", |b| {
        b.iter(|| {
            let pending = tracker.track("cancelled", || tracker.wrap(LegOptions::default(), || ()));
            if let Some(id) = pending.leg_id() {
                black_box(tracker.abort(id));
            }
        });
    });

    group.finish();
}

/// Config file loading.
fn bench_config_loading(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("dials.json"),
        r#"{ "label": "bench", "legSpans": false, "leakWarningThreshold": 1000 }"#,
    )
    .unwrap();
    let empty = TempDir::new().unwrap();

    let mut group = c.benchmark_group("config_loading");
    group.bench_function("load_json_config", |b| {
        b.iter(|| load_config(black_box(temp.path())));
    });
    group.bench_function("load_defaults_only", |b| {
        b.iter(|| load_config(black_box(empty.path())));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_track,
    bench_fan_out,
    bench_chain,
    bench_fork_prune,
    bench_config_loading
);
criterion_main!(benches);
