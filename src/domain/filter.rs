//! Filter specification for the derived task view.
//!
//! A [`FilterSpec`] is an immutable value replaced wholesale whenever the user
//! changes a filter. Its serialized form is the one persisted under the
//! `taskFilters` preference key, so every field defaults independently and a
//! partially stored value is merged over the defaults.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::task::{ParseEnumError, Priority, Task};

// =============================================================================
// Completion Filter
// =============================================================================

/// Which tasks to keep by completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionFilter {
    /// Keep every task.
    #[default]
    All,
    /// Keep completed tasks only.
    Completed,
    /// Keep tasks that are not completed.
    Incomplete,
}

impl CompletionFilter {
    /// Returns `true` if `task` passes this filter.
    #[must_use]
    pub const fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Completed => task.is_completed(),
            Self::Incomplete => !task.is_completed(),
        }
    }
}

impl FromStr for CompletionFilter {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "completed" => Ok(Self::Completed),
            "incomplete" => Ok(Self::Incomplete),
            _ => Err(ParseEnumError::new("completion filter", value)),
        }
    }
}

// =============================================================================
// Priority Filter
// =============================================================================

/// Which tasks to keep by priority.
///
/// Serialized as `"all"` or a priority name. Priority names are matched
/// without regard to case on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriorityFilter {
    /// Keep every task.
    #[default]
    All,
    /// Keep tasks with exactly this priority.
    Only(Priority),
}

impl PriorityFilter {
    /// Returns `true` if `task` passes this filter.
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Only(priority) => task.priority == priority,
        }
    }
}

impl Serialize for PriorityFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Only(priority) => serializer.serialize_str(priority.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for PriorityFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

impl FromStr for PriorityFilter {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Only)
    }
}

impl From<Priority> for PriorityFilter {
    fn from(priority: Priority) -> Self {
        Self::Only(priority)
    }
}

// =============================================================================
// Sort Order
// =============================================================================

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Open tasks first, then completed ones, each group in insertion order.
    #[default]
    #[serde(rename = "none")]
    None,
    /// Earliest due date first; tasks without a due date last.
    #[serde(rename = "dueAsc")]
    DueAsc,
    /// Latest due date first; tasks without a due date last.
    #[serde(rename = "dueDesc")]
    DueDesc,
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    /// Accepts the stored names as well as `due-asc` and `due-desc`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|character| !matches!(character, '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "dueasc" => Ok(Self::DueAsc),
            "duedesc" => Ok(Self::DueDesc),
            _ => Err(ParseEnumError::new("sort order", value)),
        }
    }
}

// =============================================================================
// Filter Specification
// =============================================================================

/// The complete filter and sort selection for the task view.
///
/// # Examples
///
/// ```rust
/// use taskboard::domain::{CompletionFilter, FilterSpec};
///
/// let spec = FilterSpec::default().toggle_completion(CompletionFilter::Completed);
/// assert!(spec.is_active());
///
/// // Selecting the active value again resets it.
/// let spec = spec.toggle_completion(CompletionFilter::Completed);
/// assert!(!spec.is_active());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Completion filter.
    pub completion: CompletionFilter,
    /// Priority filter.
    pub priority: PriorityFilter,
    /// Sort order.
    pub sort: SortOrder,
}

impl FilterSpec {
    /// Returns the default specification: everything, unsorted.
    #[must_use]
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Returns `true` if any field differs from its default.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self != Self::default()
    }

    /// Returns `true` if `task` passes both the completion and priority
    /// filters.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.completion.matches(task) && self.priority.matches(task)
    }

    /// Returns a new specification with the given completion filter.
    #[must_use]
    pub const fn with_completion(self, completion: CompletionFilter) -> Self {
        Self { completion, ..self }
    }

    /// Returns a new specification with the given priority filter.
    #[must_use]
    pub const fn with_priority(self, priority: PriorityFilter) -> Self {
        Self { priority, ..self }
    }

    /// Returns a new specification with the given sort order.
    #[must_use]
    pub const fn with_sort(self, sort: SortOrder) -> Self {
        Self { sort, ..self }
    }

    /// Selects `completion`, or resets the field if it is already selected.
    #[must_use]
    pub fn toggle_completion(self, completion: CompletionFilter) -> Self {
        if self.completion == completion {
            self.with_completion(CompletionFilter::default())
        } else {
            self.with_completion(completion)
        }
    }

    /// Selects `priority`, or resets the field if it is already selected.
    #[must_use]
    pub fn toggle_priority(self, priority: PriorityFilter) -> Self {
        if self.priority == priority {
            self.with_priority(PriorityFilter::default())
        } else {
            self.with_priority(priority)
        }
    }

    /// Selects `sort`, or resets the field if it is already selected.
    #[must_use]
    pub fn toggle_sort(self, sort: SortOrder) -> Self {
        if self.sort == sort {
            self.with_sort(SortOrder::default())
        } else {
            self.with_sort(sort)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, TaskStatus};
    use rstest::rstest;

    #[rstest]
    fn test_filter_spec_wire_format_matches_stored_preferences() {
        let spec = FilterSpec {
            completion: CompletionFilter::Incomplete,
            priority: PriorityFilter::Only(Priority::High),
            sort: SortOrder::DueDesc,
        };
        let value = serde_json::to_value(spec).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"completion": "incomplete", "priority": "High", "sort": "dueDesc"})
        );
    }

    #[rstest]
    fn test_filter_spec_partial_json_merges_over_defaults() {
        let spec: FilterSpec = serde_json::from_str(r#"{"sort":"dueAsc"}"#).unwrap();
        assert_eq!(spec, FilterSpec::default().with_sort(SortOrder::DueAsc));
    }

    #[rstest]
    #[case("low")]
    #[case("LOW")]
    #[case("Low")]
    fn test_priority_filter_reads_any_case(#[case] raw: &str) {
        let filter: PriorityFilter = serde_json::from_value(serde_json::json!(raw)).unwrap();
        assert_eq!(filter, PriorityFilter::Only(Priority::Low));
    }

    #[rstest]
    #[case("dueAsc", SortOrder::DueAsc)]
    #[case("due-desc", SortOrder::DueDesc)]
    #[case("NONE", SortOrder::None)]
    fn test_sort_order_from_str(#[case] raw: &str, #[case] expected: SortOrder) {
        assert_eq!(raw.parse::<SortOrder>().unwrap(), expected);
    }

    #[rstest]
    fn test_unknown_filter_names_are_rejected() {
        assert!("urgent".parse::<PriorityFilter>().is_err());
        assert!("finished".parse::<CompletionFilter>().is_err());
    }

    #[rstest]
    fn test_matches_requires_both_filters() {
        let spec = FilterSpec::default()
            .with_completion(CompletionFilter::Completed)
            .with_priority(Priority::High.into());
        let task = Task::new(TaskId::new(1), "A").with_priority(Priority::High);
        assert!(!spec.matches(&task));
        assert!(spec.matches(&task.with_status(TaskStatus::Completed)));
    }

    #[rstest]
    fn test_toggle_sort_resets_when_reselected() {
        let spec = FilterSpec::cleared().toggle_sort(SortOrder::DueAsc);
        assert_eq!(spec.sort, SortOrder::DueAsc);
        assert_eq!(spec.toggle_sort(SortOrder::DueAsc).sort, SortOrder::None);
        assert_eq!(
            spec.toggle_sort(SortOrder::DueDesc).sort,
            SortOrder::DueDesc
        );
    }
}
