//! Completion statistics.
//!
//! Counts completed tasks per priority, the figures behind the statistics
//! chart of the task list.

use super::task::{Priority, Task};

/// Number of completed tasks for each priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionStats {
    high: usize,
    medium: usize,
    low: usize,
}

impl CompletionStats {
    /// Tallies the completed tasks in `tasks`.
    #[must_use]
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks
            .into_iter()
            .filter(|task| task.is_completed())
            .fold(Self::default(), |stats, task| stats.increment(task.priority))
    }

    const fn increment(self, priority: Priority) -> Self {
        match priority {
            Priority::High => Self {
                high: self.high + 1,
                ..self
            },
            Priority::Medium => Self {
                medium: self.medium + 1,
                ..self
            },
            Priority::Low => Self {
                low: self.low + 1,
                ..self
            },
        }
    }

    /// Returns the number of completed tasks with `priority`.
    #[must_use]
    pub const fn count(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    /// Returns the total number of completed tasks.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    /// Returns `true` if at least one task is completed.
    #[must_use]
    pub const fn has_completed(&self) -> bool {
        self.total() > 0
    }

    /// Returns `(priority, count)` rows, highest priority first.
    #[must_use]
    pub fn rows(&self) -> [(Priority, usize); 3] {
        Priority::ALL.map(|priority| (priority, self.count(priority)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, TaskStatus};
    use rstest::rstest;

    fn completed(id: i64, priority: Priority) -> Task {
        Task::new(TaskId::new(id), "done")
            .with_priority(priority)
            .with_status(TaskStatus::Completed)
    }

    #[rstest]
    fn test_counts_only_completed_tasks() {
        let tasks = vec![
            completed(1, Priority::High),
            completed(2, Priority::High),
            completed(3, Priority::Low),
            Task::new(TaskId::new(4), "open").with_priority(Priority::Medium),
        ];
        let stats = CompletionStats::from_tasks(&tasks);
        assert_eq!(
            stats.rows(),
            [(Priority::High, 2), (Priority::Medium, 0), (Priority::Low, 1)]
        );
        assert_eq!(stats.total(), 3);
    }

    #[rstest]
    fn test_empty_collection_has_nothing_completed() {
        let stats = CompletionStats::from_tasks(std::iter::empty());
        assert!(!stats.has_completed());
    }
}
