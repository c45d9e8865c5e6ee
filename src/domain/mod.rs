//! Domain module for task tracking.
//!
//! This module contains the task record, its create and update payloads,
//! the filter specification of the task view and completion statistics.

pub mod filter;
pub mod stats;
pub mod task;

pub use filter::{CompletionFilter, FilterSpec, PriorityFilter, SortOrder};
pub use stats::CompletionStats;
pub use task::{
    NewTask, OptimisticIds, ParseEnumError, Priority, Task, TaskId, TaskPatch, TaskStatus,
    ValidationError, parse_due_date,
};
