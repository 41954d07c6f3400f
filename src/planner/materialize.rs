//! Merge persisted rows with virtual rows into one date's listing.

use super::ids::parse_habit_virtual_id;
use super::{HabitRules, SkipReason, habits, rollover};
use crate::db::TaskRepository;
use crate::types::{Task, TaskResponse, ms_to_datetime};
use anyhow::Result;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One date's listing.
#[derive(Debug, Clone)]
pub struct Materialization {
    pub date: NaiveDate,
    /// Persisted and virtual rows, sorted for display.
    pub tasks: Vec<Task>,
    /// Candidates that could not be expanded.
    pub skipped: Vec<SkipReason>,
}

impl Materialization {
    pub fn responses(&self) -> Vec<TaskResponse> {
        self.tasks.iter().map(to_response).collect()
    }
}

/// Build the listing for `user_id` on `date`.
///
/// Rollover carries only appear when `date` is `today`.
pub fn materialize<R: TaskRepository + ?Sized>(
    repo: &R,
    today: NaiveDate,
    rules: HabitRules,
    user_id: &str,
    date: NaiveDate,
) -> Result<Materialization> {
    let mut tasks = repo.list_by_user_and_date(user_id, date)?;
    let persisted = tasks.len();

    let covered = covered_habits(&tasks);
    let definitions = repo.list_habit_definitions(user_id)?;
    let (habit_rows, mut skipped) = partition_expansion(habits::expand(
        &definitions,
        date,
        &covered,
        rules,
    ));
    let habit_count = habit_rows.len();
    tasks.extend(habit_rows);

    let mut rollover_count = 0;
    if date == today {
        let candidates = repo.list_undated_incomplete(user_id, today)?;
        let (rollover_rows, rollover_skipped) =
            partition_expansion(rollover::expand(&candidates, today));
        rollover_count = rollover_rows.len();
        tasks.extend(rollover_rows);
        skipped.extend(rollover_skipped);
    }

    sort_tasks(&mut tasks);

    debug!(
        user_id,
        %date,
        persisted,
        habits = habit_count,
        rollovers = rollover_count,
        skipped = skipped.len(),
        "Materialized task listing"
    );

    Ok(Materialization {
        date,
        tasks,
        skipped,
    })
}

/// Habit definitions that already have a persisted row among `rows`: either
/// a materialized occurrence, or the definition row itself scheduled that day.
fn covered_habits(rows: &[Task]) -> HashSet<String> {
    rows.iter()
        .filter_map(|row| {
            row.original_habit_id.clone().or_else(|| {
                row.is_habit_definition().then(|| row.id.clone())
            })
        })
        .collect()
}

/// Fold an expansion into its tasks and its skipped candidates, logging each skip.
fn partition_expansion<I>(items: I) -> (Vec<Task>, Vec<SkipReason>)
where
    I: Iterator<Item = std::result::Result<Task, SkipReason>>,
{
    items.fold((Vec::new(), Vec::new()), |(mut tasks, mut skipped), item| {
        match item {
            Ok(task) => tasks.push(task),
            Err(reason) => {
                warn!(%reason, "Skipping task candidate");
                skipped.push(reason);
            }
        }
        (tasks, skipped)
    })
}

/// Order by start time (untimed last), then creation time, then id.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        compare_start_time(a.start_time.as_deref(), b.start_time.as_deref())
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn compare_start_time(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Map a row to its wire shape.
///
/// Rows whose id has the habit-occurrence shape report that habit even if
/// the stored link is missing.
pub fn to_response(task: &Task) -> TaskResponse {
    let original_habit_id = task
        .original_habit_id
        .clone()
        .or_else(|| parse_habit_virtual_id(&task.id).map(|(habit_id, _)| habit_id));

    TaskResponse {
        id: task.id.clone(),
        title: task.title.clone(),
        kind: task.kind,
        category: task.category.clone(),
        start_time: task.start_time.clone(),
        duration: task.duration_minutes,
        repeat: task.repeat,
        completed: task.completed,
        scheduled_date: task.scheduled_date,
        created_at: ms_to_datetime(task.created_at),
        overdue_notified: task.overdue_notified,
        is_habit_instance: original_habit_id.is_some(),
        original_habit_id,
        rolled_over_from_task_id: task.rolled_over_from_task_id.clone(),
        original_created_at: task.original_created_at.and_then(ms_to_datetime),
        completed_at: task.completed_at.and_then(ms_to_datetime),
    }
}
