//! Benchmark for the derived view and the collection store.
//!
//! Measures view computation for each sort order over growing collections,
//! and the cost of store snapshots and optimistic patches.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::{Days, NaiveDate};
use taskboard::cache::CollectionStore;
use taskboard::domain::{
    CompletionFilter, FilterSpec, Priority, PriorityFilter, SortOrder, Task, TaskId, TaskStatus,
};
use taskboard::view::compute;

fn build_tasks(count: usize) -> Vec<Task> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..count)
        .map(|index| {
            let id = i64::try_from(index).unwrap() + 1;
            let due_date = (index % 5 != 0).then(|| start + Days::new((index % 90) as u64));
            let priority = match index % 3 {
                0 => Priority::Low,
                1 => Priority::Medium,
                _ => Priority::High,
            };
            let status = if index % 4 == 0 {
                TaskStatus::Completed
            } else {
                TaskStatus::InProgress
            };
            Task::new(TaskId::new(id), format!("task {id}"))
                .with_due_date(due_date)
                .with_priority(priority)
                .with_status(status)
        })
        .collect()
}

// =============================================================================
// 1. View Computation
// =============================================================================

fn benchmark_compute_by_sort(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("compute_by_sort");

    for size in [100, 1_000, 10_000] {
        let tasks = build_tasks(size);
        for (name, sort) in [
            ("none", SortOrder::None),
            ("due_asc", SortOrder::DueAsc),
            ("due_desc", SortOrder::DueDesc),
        ] {
            let spec = FilterSpec::default().with_sort(sort);
            group.bench_with_input(BenchmarkId::new(name, size), &tasks, |bencher, tasks| {
                bencher.iter(|| black_box(compute(black_box(tasks), &spec).len()));
            });
        }
    }

    group.finish();
}

fn benchmark_compute_filtered(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("compute_filtered");
    let tasks = build_tasks(10_000);
    let spec = FilterSpec {
        completion: CompletionFilter::Incomplete,
        priority: PriorityFilter::Only(Priority::High),
        sort: SortOrder::DueAsc,
    };

    group.bench_function("incomplete_high_due_asc", |bencher| {
        bencher.iter(|| black_box(compute(black_box(&tasks), &spec).len()));
    });

    group.finish();
}

// =============================================================================
// 2. Store Operations
// =============================================================================

fn benchmark_store(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("store");

    for size in [100, 10_000] {
        let store = CollectionStore::new();
        store.replace(build_tasks(size));

        group.bench_with_input(BenchmarkId::new("snapshot", size), &store, |bencher, store| {
            bencher.iter(|| black_box(store.snapshot()));
        });

        group.bench_with_input(
            BenchmarkId::new("patch_one", size),
            &store,
            |bencher, store| {
                let target = TaskId::new(1);
                bencher.iter(|| {
                    store.patch(
                        |task| task.id == target,
                        |task| Some(task.clone().with_status(task.status.toggled())),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_compute_by_sort,
    benchmark_compute_filtered,
    benchmark_store
);
criterion_main!(benches);
