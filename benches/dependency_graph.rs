//! Benchmarks for the dependency graph engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use vanguard::domain::models::Task;
use vanguard::MissionGraph;

/// Layered DAG: `width` tasks per level, each depending on every task in
/// the previous level.
fn layered_tasks(levels: usize, width: usize) -> Vec<Task> {
    let mission = Uuid::new_v4();
    let mut tasks: Vec<Task> = Vec::with_capacity(levels * width);
    let mut previous: Vec<Uuid> = Vec::new();

    for level in 0..levels {
        let mut current = Vec::with_capacity(width);
        for i in 0..width {
            let mut task = Task::new(mission, format!("L{level}-{i}"), "bench task")
                .with_estimated_duration(30 + (i as i64 % 7) * 10);
            task.depends_on = previous.clone();
            current.push(task.id);
            tasks.push(task);
        }
        previous = current;
    }
    tasks
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for size in [10usize, 50, 200] {
        let tasks = layered_tasks(size / 5, 5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &tasks, |b, tasks| {
            b.iter(|| MissionGraph::from_tasks(black_box(tasks)));
        });
    }
    group.finish();
}

fn bench_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("levels");
    for size in [10usize, 50, 200] {
        let tasks = layered_tasks(size / 5, 5);
        let graph = MissionGraph::from_tasks(&tasks);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| graph.levels().expect("acyclic"));
        });
    }
    group.finish();
}

fn bench_critical_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("critical_path");
    for size in [10usize, 50, 200] {
        let tasks = layered_tasks(size / 5, 5);
        let graph = MissionGraph::from_tasks(&tasks);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| graph.critical_path().expect("acyclic"));
        });
    }
    group.finish();
}

fn bench_cycle_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_detection");
    for size in [10usize, 50, 200] {
        let tasks = layered_tasks(size / 5, 5);
        let graph = MissionGraph::from_tasks(&tasks);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| graph.detect_cycle());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_graph_build,
    bench_levels,
    bench_critical_path,
    bench_cycle_detection
);
criterion_main!(benches);
