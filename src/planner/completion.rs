//! Completion transitions for real and virtual tasks.
//!
//! - Real rows toggle freely between complete and incomplete.
//! - A habit occurrence id is promoted to a real row on completion. If a row
//!   for that `(habit, date)` already exists it is completed instead. A
//!   definition scheduled on the date is completed itself.
//! - A rollover id completes its origin row; no new row is created. The
//!   origin must be a task that can be carried over to the id's date, and
//!   that date may not be in the future.
//!
//! Promotion checks for an existing occurrence and then inserts, as two
//! repository calls. Two simultaneous promotions of the same occurrence can
//! both insert; nothing here prevents that.

use super::habits::{HabitRules, occurs_on};
use super::ids::TaskRef;
use crate::clock::Clock;
use crate::db::TaskRepository;
use crate::error::{ApiError, ApiResult};
use crate::types::{Task, TaskUpdate};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

pub fn set_completion<R: TaskRepository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    rules: HabitRules,
    user_id: &str,
    raw_id: &str,
    completed: bool,
) -> ApiResult<Task> {
    let task_ref = TaskRef::parse(raw_id);

    if task_ref.is_virtual() && !completed {
        return Err(ApiError::invalid_state(
            "Virtual tasks have no completed state to revert",
        ));
    }

    match task_ref {
        TaskRef::Real(id) => set_real(repo, clock, user_id, &id, completed),
        TaskRef::HabitVirtual { habit_id, date } => {
            complete_habit_occurrence(repo, clock, rules, user_id, &habit_id, date)
        }
        TaskRef::RolloverVirtual { origin_id, date } => {
            complete_rollover(repo, clock, user_id, &origin_id, date)
        }
        TaskRef::Invalid => Err(ApiError::invalid_value("id", "Malformed task id")),
    }
}

/// Load a row and check it belongs to `user_id`.
fn owned_row<R: TaskRepository + ?Sized>(repo: &R, user_id: &str, id: &str) -> ApiResult<Task> {
    let task = repo
        .get_by_id(id)?
        .ok_or_else(|| ApiError::task_not_found(id))?;
    if task.user_id != user_id {
        return Err(ApiError::forbidden());
    }
    Ok(task)
}

fn apply_completion<R: TaskRepository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    id: &str,
    completed: bool,
) -> ApiResult<Task> {
    let update = TaskUpdate::completion(completed, clock.now_ms());
    repo.update_fields(user_id, id, &update)?
        .ok_or_else(|| ApiError::task_not_found(id))
}

fn set_real<R: TaskRepository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    id: &str,
    completed: bool,
) -> ApiResult<Task> {
    let task = owned_row(repo, user_id, id)?;
    if task.completed == completed {
        return Ok(task);
    }

    let task = apply_completion(repo, clock, user_id, id, completed)?;
    info!(task_id = %id, completed, "Set task completion");
    Ok(task)
}

fn complete_habit_occurrence<R: TaskRepository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    rules: HabitRules,
    user_id: &str,
    habit_id: &str,
    date: NaiveDate,
) -> ApiResult<Task> {
    let definition = owned_row(repo, user_id, habit_id)?;
    if !definition.is_habit_definition() {
        return Err(ApiError::invalid_value(
            "id",
            "Task is not a recurring habit definition",
        ));
    }
    if !occurs_on(&definition, date, &rules) {
        return Err(ApiError::invalid_value(
            "id",
            "Habit has no occurrence on that date",
        ));
    }

    // A definition scheduled on the date is that day's occurrence itself
    if definition.scheduled_date == Some(date) {
        if definition.completed {
            return Ok(definition);
        }
        let task = apply_completion(repo, clock, user_id, &definition.id, true)?;
        info!(task_id = %task.id, %date, "Completed scheduled habit definition");
        return Ok(task);
    }

    // Re-check right before inserting: the occurrence may have been promoted already
    let existing = repo.find_habit_occurrences(user_id, habit_id, date)?;
    if let Some(occurrence) = existing.first() {
        if occurrence.completed {
            return Ok(occurrence.clone());
        }
        let task = apply_completion(repo, clock, user_id, &occurrence.id, true)?;
        info!(task_id = %task.id, habit_id, %date, "Completed existing habit occurrence");
        return Ok(task);
    }

    let now = clock.now_ms();
    let occurrence = Task {
        id: Uuid::now_v7().to_string(),
        user_id: user_id.to_string(),
        title: definition.title.clone(),
        kind: definition.kind,
        category: definition.category.clone(),
        start_time: definition.start_time.clone(),
        duration_minutes: definition.duration_minutes,
        repeat: definition.repeat,
        scheduled_date: Some(date),
        completed: true,
        completed_at: Some(now),
        created_at: now,
        overdue_notified: false,
        rolled_over_from_task_id: None,
        original_created_at: Some(definition.created_at),
        original_habit_id: Some(definition.id.clone()),
    };
    repo.insert(&occurrence)?;

    info!(task_id = %occurrence.id, habit_id, %date, "Promoted habit occurrence");
    Ok(occurrence)
}

fn complete_rollover<R: TaskRepository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    origin_id: &str,
    date: NaiveDate,
) -> ApiResult<Task> {
    let origin = owned_row(repo, user_id, origin_id)?;
    if date > clock.today() || !origin.can_roll_over_to(date) {
        return Err(ApiError::invalid_value(
            "id",
            "Task is not carried over to that date",
        ));
    }
    if origin.completed {
        return Ok(origin);
    }

    let task = apply_completion(repo, clock, user_id, origin_id, true)?;
    info!(task_id = %origin_id, %date, "Completed rolled-over task");
    Ok(task)
}
