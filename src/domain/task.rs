//! Task domain model.
//!
//! This module contains the record shape of the remote task collection, the
//! create and partial-update payloads sent to the server, and the allocator
//! for optimistic identifiers used before the server has assigned a real one.

use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a task.
///
/// Identifiers assigned by the server are positive. Negative identifiers are
/// optimistic placeholders handed out by [`OptimisticIds`] and never reach the
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Creates a `TaskId` from its raw value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` if this identifier was allocated locally and has not
    /// been replaced by a server-assigned one yet.
    #[must_use]
    pub const fn is_optimistic(self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for TaskId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Allocator for optimistic identifiers.
///
/// Values are drawn from the negative numbers, strictly decreasing from `-1`,
/// so they can never collide with a server identifier or with each other.
#[derive(Debug)]
pub struct OptimisticIds {
    last: AtomicI64,
}

impl OptimisticIds {
    /// Creates an allocator whose first identifier is `-1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Allocates the next optimistic identifier.
    pub fn allocate(&self) -> TaskId {
        TaskId(self.last.fetch_sub(1, Ordering::Relaxed) - 1)
    }
}

impl Default for OptimisticIds {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Error returned when an enumerated name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    /// Creates an error for `value`, which is not a valid `kind`.
    #[must_use]
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// The priority level of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority. New tasks default to this level.
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// All priorities, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Returns the canonical name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    /// Parses a priority name, ignoring ASCII case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError::new("priority", value)),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum TaskStatus {
    /// Task is still open.
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    /// Task has been completed.
    Completed,
}

impl TaskStatus {
    /// Returns `true` for [`TaskStatus::Completed`].
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the other status.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::InProgress => Self::Completed,
            Self::Completed => Self::InProgress,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    /// Accepts `"In Progress"`, `"InProgress"`, `"in_progress"` and
    /// `"Completed"` in any ASCII case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|character| !matches!(character, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseEnumError::new("status", value)),
        }
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(formatter, "In Progress"),
            Self::Completed => write!(formatter, "Completed"),
        }
    }
}

// =============================================================================
// Lenient wire decoding
// =============================================================================

/// Parses a due date the way the server and older clients emit it.
///
/// Accepts `YYYY-MM-DD` and RFC 3339 timestamps. Anything else, including the
/// empty string, yields `None`.
#[must_use]
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|datetime| datetime.date_naive())
        })
}

fn lenient_due_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|value| {
        let parsed = parse_due_date(value);
        if parsed.is_none() && !value.trim().is_empty() {
            tracing::debug!(due_date = value, "Ignoring unparsable due date");
        }
        parsed
    }))
}

fn lenient_enum<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|value| value.parse().ok())
        .unwrap_or_default())
}

// =============================================================================
// Task
// =============================================================================

/// A task record as held by the collection cache.
///
/// Equality is structural so that a restored cache can be compared entry by
/// entry against the state captured before a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier within the collection.
    pub id: TaskId,
    /// Title of the task.
    #[serde(default)]
    pub title: String,
    /// Optional due date without a time component.
    #[serde(default, deserialize_with = "lenient_due_date")]
    pub due_date: Option<NaiveDate>,
    /// Priority level.
    #[serde(default, deserialize_with = "lenient_enum")]
    pub priority: Priority,
    /// Completion status.
    #[serde(default, deserialize_with = "lenient_enum")]
    pub status: TaskStatus,
}

impl Task {
    /// Creates an in-progress, medium priority task without a due date.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            due_date: None,
            priority: Priority::default(),
            status: TaskStatus::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Builder-style methods (pure immutable updates)
    // -------------------------------------------------------------------------

    /// Returns a new task with the given due date.
    #[must_use]
    pub fn with_due_date(self, due_date: Option<NaiveDate>) -> Self {
        Self { due_date, ..self }
    }

    /// Returns a new task with the given priority.
    #[must_use]
    pub fn with_priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    /// Returns a new task with the given status.
    #[must_use]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self { status, ..self }
    }

    // -------------------------------------------------------------------------
    // Derived predicates
    // -------------------------------------------------------------------------

    /// Returns `true` if the task is completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Returns `true` if the task is still open and its due date lies
    /// strictly before `today`.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_completed() && self.due_date.is_some_and(|due| due < today)
    }

    /// Returns `true` if the task is due on `date`.
    #[must_use]
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.due_date == Some(date)
    }

    /// Returns `true` if the task carries an optimistic identifier.
    #[must_use]
    pub const fn is_optimistic(&self) -> bool {
        self.id.is_optimistic()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Caller-side validation failures for task payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The title is empty or whitespace only.
    #[error("Please write a task title.")]
    EmptyTitle,

    /// The due date lies before the caller's current date.
    #[error("Due date cannot be in the past.")]
    DueDateInPast,
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        Err(ValidationError::EmptyTitle)
    } else {
        Ok(())
    }
}

fn validate_due_date(due_date: Option<NaiveDate>, today: NaiveDate) -> Result<(), ValidationError> {
    match due_date {
        Some(due) if due < today => Err(ValidationError::DueDateInPast),
        _ => Ok(()),
    }
}

// =============================================================================
// NewTask
// =============================================================================

/// Payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// Title of the task.
    pub title: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Priority level.
    #[serde(default)]
    pub priority: Priority,
    /// Initial status.
    #[serde(default)]
    pub status: TaskStatus,
}

impl NewTask {
    /// Creates a payload with the given title and default fields.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            due_date: None,
            priority: Priority::default(),
            status: TaskStatus::default(),
        }
    }

    /// Returns a new payload with the given due date.
    #[must_use]
    pub fn with_due_date(self, due_date: Option<NaiveDate>) -> Self {
        Self { due_date, ..self }
    }

    /// Returns a new payload with the given priority.
    #[must_use]
    pub fn with_priority(self, priority: Priority) -> Self {
        Self { priority, ..self }
    }

    /// Returns a new payload with the given status.
    #[must_use]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self { status, ..self }
    }

    /// Checks the payload before it is submitted.
    ///
    /// The title must not be blank and the due date, if any, must not be
    /// before `today`.
    ///
    /// # Errors
    ///
    /// Returns the first rule the payload violates.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_due_date(self.due_date, today)
    }

    /// Materialises the payload as a task with the given identifier.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            due_date: self.due_date,
            priority: self.priority,
            status: self.status,
        }
    }
}

// =============================================================================
// TaskPatch
// =============================================================================

mod patch_due_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option, clippy::option_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Option<NaiveDate>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    #[allow(clippy::option_option)]
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<NaiveDate>>, D::Error> {
        Option::<NaiveDate>::deserialize(deserializer).map(Some)
    }
}

/// Typed partial update for a task.
///
/// Every field is optional; only the fields that are set are merged over the
/// existing record. `due_date` is tri-state: `None` leaves the date alone,
/// `Some(None)` clears it and `Some(Some(date))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Due date change.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "patch_due_date")]
    pub due_date: Option<Option<NaiveDate>>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Creates a patch that flips the completion state of `task`.
    #[must_use]
    pub fn toggle_completed(task: &Task) -> Self {
        Self::status(task.status.toggled())
    }

    /// Returns a new patch that sets the title.
    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Returns a new patch that sets or clears the due date.
    #[must_use]
    pub fn with_due_date(self, due_date: Option<NaiveDate>) -> Self {
        Self {
            due_date: Some(due_date),
            ..self
        }
    }

    /// Returns a new patch that sets the priority.
    #[must_use]
    pub fn with_priority(self, priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..self
        }
    }

    /// Returns a new patch that sets the status.
    #[must_use]
    pub fn with_status(self, status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..self
        }
    }

    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }

    /// Merges the set fields over `task`. The identifier is never touched.
    #[must_use]
    pub fn apply(&self, task: &Task) -> Task {
        Task {
            id: task.id,
            title: self.title.clone().unwrap_or_else(|| task.title.clone()),
            due_date: self.due_date.unwrap_or(task.due_date),
            priority: self.priority.unwrap_or(task.priority),
            status: self.status.unwrap_or(task.status),
        }
    }

    /// Applies the create-time rules to the fields this patch sets.
    ///
    /// # Errors
    ///
    /// Returns the first rule a set field violates.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_due_date(self.due_date.flatten(), today)
    }
}

// =============================================================================
// Tests
// =============================================================================
