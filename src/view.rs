//! Derived view computation.
//!
//! The view is a filtered and ordered projection of the cached entries. It is
//! recomputed from scratch whenever the cache or the filter changes and is
//! never written back.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::domain::{FilterSpec, SortOrder, Task};

/// Placeholder displayed for a task without a due date.
pub const MISSING_DUE_DATE: &str = "—";

/// Computes the visible ordering of `entries` under `spec`.
///
/// Tasks failing either filter are dropped. With a due-date sort, tasks
/// without a due date come last in both directions and ties keep their
/// relative order. Without a sort, open tasks come before completed ones and
/// each group keeps its relative order.
///
/// # Examples
///
/// ```rust
/// use taskboard::domain::{FilterSpec, Task, TaskId, TaskStatus};
/// use taskboard::view::compute;
///
/// let entries = vec![
///     Task::new(TaskId::new(1), "done").with_status(TaskStatus::Completed),
///     Task::new(TaskId::new(2), "open"),
/// ];
/// let view = compute(&entries, &FilterSpec::default());
/// assert_eq!(view[0].title, "open");
/// ```
#[must_use]
pub fn compute<'a>(entries: &'a [Task], spec: &FilterSpec) -> Vec<&'a Task> {
    let filtered = entries.iter().filter(|task| spec.matches(task));
    match spec.sort {
        SortOrder::None => {
            let (mut open, completed): (Vec<_>, Vec<_>) =
                filtered.partition(|task| !task.is_completed());
            open.extend(completed);
            open
        }
        SortOrder::DueAsc => sorted_by_due(filtered, false),
        SortOrder::DueDesc => sorted_by_due(filtered, true),
    }
}

fn sorted_by_due<'a>(tasks: impl Iterator<Item = &'a Task>, descending: bool) -> Vec<&'a Task> {
    let mut tasks: Vec<&Task> = tasks.collect();
    tasks.sort_by(|left, right| compare_due(left.due_date, right.due_date, descending));
    tasks
}

/// Orders dated tasks by date and puts undated ones last.
fn compare_due(
    left: Option<NaiveDate>,
    right: Option<NaiveDate>,
    descending: bool,
) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => {
            let ordering = left.cmp(&right);
            if descending { ordering.reverse() } else { ordering }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Formats a due date as `dd.mm.yyyy`, or [`MISSING_DUE_DATE`] when absent.
#[must_use]
pub fn format_due_date(due_date: Option<NaiveDate>) -> String {
    due_date.map_or_else(
        || MISSING_DUE_DATE.to_string(),
        |date| date.format("%d.%m.%Y").to_string(),
    )
}
