//! Read-time carry-over of undated tasks onto today's listing.

use super::ids::rollover_virtual_id;
use super::{SkipReason, check_virtual_source};
use crate::types::Task;
use chrono::NaiveDate;

/// Build the unpersisted view of `origin` on `today`.
pub fn virtual_rollover(origin: &Task, today: NaiveDate) -> Task {
    Task {
        id: rollover_virtual_id(&origin.id, today),
        scheduled_date: Some(today),
        completed: false,
        completed_at: None,
        rolled_over_from_task_id: Some(origin.id.clone()),
        original_created_at: Some(origin.created_at),
        original_habit_id: None,
        ..origin.clone()
    }
}

/// Lazily expand rollover candidates into virtual rows for `today`.
///
/// Rows that are not (or no longer) eligible are passed over; malformed
/// candidates yield `Err`. The candidates themselves are never modified.
pub fn expand(
    candidates: &[Task],
    today: NaiveDate,
) -> impl Iterator<Item = Result<Task, SkipReason>> + '_ {
    candidates
        .iter()
        .filter(move |task| task.is_rollover_candidate(today))
        .map(move |task| {
            check_virtual_source(task)?;
            Ok(virtual_rollover(task, today))
        })
}
