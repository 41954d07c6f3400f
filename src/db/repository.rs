//! Storage seam for task rows.

use crate::types::{Task, TaskUpdate};
use anyhow::Result;
use chrono::NaiveDate;

/// Trait for task storage operations.
///
/// Every query is partitioned by user except [`TaskRepository::get_by_id`],
/// which returns the row regardless of owner so callers can tell "missing"
/// apart from "belongs to someone else".
pub trait TaskRepository: Send + Sync {
    /// Rows whose `scheduled_date` equals `date`.
    fn list_by_user_and_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>>;

    /// Incomplete original tasks with no start time that are undated or
    /// dated before `today`.
    fn list_undated_incomplete(&self, user_id: &str, today: NaiveDate) -> Result<Vec<Task>>;

    /// Recurring habit definitions (excludes their materialized occurrences).
    fn list_habit_definitions(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Persisted occurrences of one habit on one date.
    fn find_habit_occurrences(
        &self,
        user_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Task>>;

    fn get_by_id(&self, task_id: &str) -> Result<Option<Task>>;

    fn insert(&self, task: &Task) -> Result<()>;

    /// Apply `update` to the row keyed by `(task_id, user_id)`. Returns the
    /// updated row, or `None` if no such row exists for that user.
    fn update_fields(
        &self,
        user_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Option<Task>>;

    /// Delete the row keyed by `(task_id, user_id)`. Returns whether a row
    /// was removed.
    fn delete(&self, user_id: &str, task_id: &str) -> Result<bool>;
}
