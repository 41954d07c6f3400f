//! Habit occurrence expansion.

use super::ids::habit_virtual_id;
use super::{SkipReason, check_virtual_source};
use crate::clock::date_of;
use crate::types::{RepeatPolicy, Task};
use chrono::{Datelike, FixedOffset, NaiveDate, Weekday};
use std::collections::HashSet;

/// Recurrence rules shared by listing and completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitRules {
    /// Date offset used to turn a definition's `created_at` into its anchor date.
    pub offset: FixedOffset,
    /// Weekday for weekly habits. `None` means the anchor's weekday.
    pub weekly_weekday: Option<Weekday>,
}

/// First date a habit definition can occur on.
///
/// An explicit `scheduled_date` on the definition is its start date;
/// otherwise the calendar date it was created.
pub fn anchor_date(definition: &Task, offset: FixedOffset) -> NaiveDate {
    definition
        .scheduled_date
        .unwrap_or_else(|| date_of(definition.created_at, offset))
}

/// Whether a habit definition has an occurrence on `date`.
pub fn occurs_on(definition: &Task, date: NaiveDate, rules: &HabitRules) -> bool {
    if !definition.is_habit_definition() {
        return false;
    }

    let anchor = anchor_date(definition, rules.offset);
    if date < anchor {
        return false;
    }

    match definition.repeat {
        RepeatPolicy::Daily => true,
        RepeatPolicy::Weekly => {
            date.weekday() == rules.weekly_weekday.unwrap_or_else(|| anchor.weekday())
        }
        RepeatPolicy::None => false,
    }
}

/// Build the unpersisted occurrence of `definition` on `date`.
pub fn virtual_occurrence(definition: &Task, date: NaiveDate) -> Task {
    Task {
        id: habit_virtual_id(&definition.id, date),
        user_id: definition.user_id.clone(),
        title: definition.title.clone(),
        kind: definition.kind,
        category: definition.category.clone(),
        start_time: definition.start_time.clone(),
        duration_minutes: definition.duration_minutes,
        repeat: definition.repeat,
        scheduled_date: Some(date),
        completed: false,
        completed_at: None,
        created_at: definition.created_at,
        overdue_notified: false,
        rolled_over_from_task_id: None,
        original_created_at: Some(definition.created_at),
        original_habit_id: Some(definition.id.clone()),
    }
}

/// Lazily expand habit definitions into virtual occurrences for `date`.
///
/// Definitions listed in `covered` already have a persisted row for `date`
/// and produce nothing. Malformed definitions yield `Err` instead of a task.
pub fn expand<'a>(
    definitions: &'a [Task],
    date: NaiveDate,
    covered: &'a HashSet<String>,
    rules: HabitRules,
) -> impl Iterator<Item = Result<Task, SkipReason>> + 'a {
    definitions
        .iter()
        .filter(move |def| !covered.contains(&def.id))
        .filter(move |def| occurs_on(def, date, &rules))
        .map(move |def| {
            check_virtual_source(def)?;
            Ok(virtual_occurrence(def, date))
        })
}
