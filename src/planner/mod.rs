//! Task materialization and completion rules.
//!
//! A day's listing is the persisted rows for that date plus rows synthesized
//! at read time: occurrences of recurring habits that have not been completed
//! yet, and (on today's listing only) undated incomplete tasks carried over.
//! Completing a synthesized row writes it through to the repository.

pub mod completion;
pub mod habits;
pub mod ids;
pub mod materialize;
pub mod rollover;

pub use habits::HabitRules;
pub use ids::TaskRef;
pub use materialize::{Materialization, to_response};

use crate::clock::Clock;
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTask, Task, TaskKind, TaskUpdate, is_valid_start_time};
use chrono::{NaiveDate, Weekday};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Why a stored row could not be turned into a virtual row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("task {task_id} has a blank title")]
    BlankTitle { task_id: String },

    #[error("task {task_id} has an invalid start time '{start_time}'")]
    InvalidStartTime { task_id: String, start_time: String },

    #[error("task id '{task_id}' cannot be encoded in a virtual id")]
    IrreversibleId { task_id: String },
}

/// Check that a definition or rollover origin can back a virtual row.
fn check_virtual_source(task: &Task) -> Result<(), SkipReason> {
    if task.title.trim().is_empty() {
        return Err(SkipReason::BlankTitle {
            task_id: task.id.clone(),
        });
    }
    if let Some(start_time) = task.start_time.as_deref()
        && !is_valid_start_time(start_time)
    {
        return Err(SkipReason::InvalidStartTime {
            task_id: task.id.clone(),
            start_time: start_time.to_string(),
        });
    }
    if !ids::is_reversible_origin_id(&task.id) {
        return Err(SkipReason::IrreversibleId {
            task_id: task.id.clone(),
        });
    }
    Ok(())
}

/// Tunables for recurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerSettings {
    /// Weekday weekly habits land on. `None` keeps each habit's anchor weekday.
    pub weekly_weekday: Option<Weekday>,
}

/// Entry point for listing and mutating a user's tasks.
#[derive(Clone)]
pub struct Planner {
    repo: Arc<dyn crate::db::TaskRepository>,
    clock: Arc<dyn Clock>,
    settings: PlannerSettings,
}

impl Planner {
    pub fn new(
        repo: Arc<dyn crate::db::TaskRepository>,
        clock: Arc<dyn Clock>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            repo,
            clock,
            settings,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn habit_rules(&self) -> HabitRules {
        HabitRules {
            offset: self.clock.offset(),
            weekly_weekday: self.settings.weekly_weekday,
        }
    }

    /// Materialized listing for `date` (today when `None`).
    pub fn list_for_date(
        &self,
        user_id: &str,
        date: Option<NaiveDate>,
    ) -> ApiResult<Materialization> {
        let date = date.unwrap_or_else(|| self.today());
        let listing = materialize::materialize(
            self.repo.as_ref(),
            self.clock.today(),
            self.habit_rules(),
            user_id,
            date,
        )?;
        Ok(listing)
    }

    /// Set the completion state of a real or virtual task.
    pub fn set_completion(&self, user_id: &str, raw_id: &str, completed: bool) -> ApiResult<Task> {
        completion::set_completion(
            self.repo.as_ref(),
            self.clock.as_ref(),
            self.habit_rules(),
            user_id,
            raw_id,
            completed,
        )
    }

    /// Create a real row from user input.
    pub fn create_task(&self, user_id: &str, input: NewTask) -> ApiResult<Task> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::missing_field("title"));
        }
        if let Some(start_time) = input.start_time.as_deref() {
            validate_start_time(start_time)?;
        }
        if let Some(duration) = input.duration_minutes {
            validate_duration(duration)?;
        }
        if input.repeat.is_recurring() && input.kind != TaskKind::Habit {
            return Err(ApiError::invalid_value(
                "repeat",
                "Only habits can have a repeat policy",
            ));
        }

        let task = Task {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            title,
            kind: input.kind,
            category: input.category.trim().to_string(),
            start_time: input.start_time,
            duration_minutes: input.duration_minutes,
            repeat: input.repeat,
            scheduled_date: input.scheduled_date,
            completed: false,
            completed_at: None,
            created_at: self.clock.now_ms(),
            overdue_notified: false,
            rolled_over_from_task_id: None,
            original_created_at: None,
            original_habit_id: None,
        };

        self.repo.insert(&task)?;
        info!(task_id = %task.id, kind = task.kind.as_str(), "Created task");
        Ok(task)
    }

    /// Fetch one real row owned by `user_id`.
    pub fn get_task(&self, user_id: &str, task_id: &str) -> ApiResult<Task> {
        let id = real_id(task_id)?;
        let task = self
            .repo
            .get_by_id(&id)?
            .ok_or_else(|| ApiError::task_not_found(&id))?;
        if task.user_id != user_id {
            return Err(ApiError::forbidden());
        }
        Ok(task)
    }

    /// Edit fields of a real row. Completion goes through [`Planner::set_completion`].
    pub fn update_task(&self, user_id: &str, task_id: &str, update: TaskUpdate) -> ApiResult<Task> {
        if update.completed.is_some() || update.completed_at.is_some() {
            return Err(ApiError::invalid_value(
                "completed",
                "Use the completion endpoint to change completion state",
            ));
        }
        if let Some(title) = update.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(ApiError::invalid_value("title", "title must not be empty"));
        }
        if let Some(Some(start_time)) = update.start_time.as_ref() {
            validate_start_time(start_time)?;
        }
        if let Some(Some(duration)) = update.duration_minutes {
            validate_duration(duration)?;
        }

        let existing = self.get_task(user_id, task_id)?;
        if update.repeat.is_some_and(|r| r.is_recurring()) && existing.kind != TaskKind::Habit {
            return Err(ApiError::invalid_value(
                "repeat",
                "Only habits can have a repeat policy",
            ));
        }
        if update.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .repo
            .update_fields(user_id, &existing.id, &update)?
            .ok_or_else(|| ApiError::task_not_found(&existing.id))?;
        info!(task_id = %updated.id, "Updated task");
        Ok(updated)
    }

    /// Delete a real row. Occurrences already materialized from a deleted
    /// habit definition are left in place.
    pub fn delete_task(&self, user_id: &str, task_id: &str) -> ApiResult<()> {
        let existing = self.get_task(user_id, task_id)?;
        if !self.repo.delete(user_id, &existing.id)? {
            return Err(ApiError::task_not_found(&existing.id));
        }
        info!(task_id = %existing.id, "Deleted task");
        Ok(())
    }
}

/// Resolve an id that must name a persisted row.
fn real_id(raw: &str) -> ApiResult<String> {
    match TaskRef::parse(raw) {
        TaskRef::Real(id) => Ok(id),
        TaskRef::HabitVirtual { .. } | TaskRef::RolloverVirtual { .. } => Err(
            ApiError::invalid_state("Virtual tasks only support completion"),
        ),
        TaskRef::Invalid => Err(ApiError::invalid_value("id", "Malformed task id")),
    }
}

fn validate_start_time(start_time: &str) -> ApiResult<()> {
    if is_valid_start_time(start_time) {
        Ok(())
    } else {
        Err(ApiError::invalid_value(
            "startTime",
            "startTime must be HH:MM",
        ))
    }
}

fn validate_duration(duration: i64) -> ApiResult<()> {
    if duration > 0 {
        Ok(())
    } else {
        Err(ApiError::invalid_value(
            "duration",
            "duration must be a positive number of minutes",
        ))
    }
}
