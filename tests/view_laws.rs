//! Property-based tests for the derived view.
//!
//! 1. **Idempotence**: computing the view of a view yields the same view
//! 2. **Soundness**: every visible task passes the filters
//! 3. **Completeness**: every task passing the filters is visible, once
//! 4. **Default ordering**: open tasks first, insertion order within groups
//! 5. **Due ordering**: dated tasks ordered by date, undated ones last

use chrono::NaiveDate;
use proptest::prelude::*;

use taskboard::domain::{
    CompletionFilter, FilterSpec, Priority, PriorityFilter, SortOrder, Task, TaskId, TaskStatus,
};
use taskboard::view::compute;

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High)]
}

fn status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![Just(TaskStatus::InProgress), Just(TaskStatus::Completed)]
}

fn due_strategy() -> impl Strategy<Value = Option<NaiveDate>> {
    prop::option::of((0_u32..20).prop_map(|day| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(day))
    }))
}

fn entries_strategy() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        (due_strategy(), priority_strategy(), status_strategy()),
        0..40,
    )
    .prop_map(|fields| {
        fields
            .into_iter()
            .zip(1_i64..)
            .map(|((due_date, priority, status), id)| {
                Task::new(TaskId::new(id), format!("task {id}"))
                    .with_due_date(due_date)
                    .with_priority(priority)
                    .with_status(status)
            })
            .collect()
    })
}

fn spec_strategy() -> impl Strategy<Value = FilterSpec> {
    (
        prop_oneof![
            Just(CompletionFilter::All),
            Just(CompletionFilter::Completed),
            Just(CompletionFilter::Incomplete)
        ],
        prop_oneof![
            Just(PriorityFilter::All),
            priority_strategy().prop_map(PriorityFilter::Only)
        ],
        prop_oneof![
            Just(SortOrder::None),
            Just(SortOrder::DueAsc),
            Just(SortOrder::DueDesc)
        ],
    )
        .prop_map(|(completion, priority, sort)| FilterSpec {
            completion,
            priority,
            sort,
        })
}

fn position(entries: &[Task], task: &Task) -> usize {
    entries
        .iter()
        .position(|entry| entry.id == task.id)
        .unwrap()
}

proptest! {
    #[test]
    fn prop_compute_is_idempotent(entries in entries_strategy(), spec in spec_strategy()) {
        let once: Vec<Task> = compute(&entries, &spec).into_iter().cloned().collect();
        let twice: Vec<Task> = compute(&once, &spec).into_iter().cloned().collect();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_visible_tasks_pass_filters(entries in entries_strategy(), spec in spec_strategy()) {
        for task in compute(&entries, &spec) {
            prop_assert!(spec.matches(task));
        }
    }

    #[test]
    fn prop_every_matching_task_is_visible_once(entries in entries_strategy(), spec in spec_strategy()) {
        let view = compute(&entries, &spec);
        let expected = entries.iter().filter(|task| spec.matches(task)).count();
        prop_assert_eq!(view.len(), expected);
        for task in entries.iter().filter(|task| spec.matches(task)) {
            prop_assert_eq!(view.iter().filter(|visible| visible.id == task.id).count(), 1);
        }
    }

    #[test]
    fn prop_default_ordering_is_stable_partition(entries in entries_strategy()) {
        let view = compute(&entries, &FilterSpec::default());
        let first_completed = view
            .iter()
            .position(|task| task.is_completed())
            .unwrap_or(view.len());
        prop_assert!(view[first_completed..].iter().all(|task| task.is_completed()));
        for pair in view.windows(2) {
            if pair[0].is_completed() == pair[1].is_completed() {
                prop_assert!(position(&entries, pair[0]) < position(&entries, pair[1]));
            }
        }
    }

    #[test]
    fn prop_due_ordering_puts_undated_last(entries in entries_strategy(), descending in any::<bool>()) {
        let sort = if descending { SortOrder::DueDesc } else { SortOrder::DueAsc };
        let view = compute(&entries, &FilterSpec::default().with_sort(sort));
        for pair in view.windows(2) {
            match (pair[0].due_date, pair[1].due_date) {
                (Some(left), Some(right)) => {
                    if descending {
                        prop_assert!(left >= right);
                    } else {
                        prop_assert!(left <= right);
                    }
                    if left == right {
                        prop_assert!(position(&entries, pair[0]) < position(&entries, pair[1]));
                    }
                }
                (None, Some(_)) => prop_assert!(false, "undated task before a dated one"),
                (None, None) => {
                    prop_assert!(position(&entries, pair[0]) < position(&entries, pair[1]));
                }
                (Some(_), None) => {}
            }
        }
    }
}
