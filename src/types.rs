//! Core types for the habit planner.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether a row is a one-off task or a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Task,
    Habit,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Task => "task",
            TaskKind::Habit => "habit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task" => Some(TaskKind::Task),
            "habit" => Some(TaskKind::Habit),
            _ => None,
        }
    }
}

/// Recurrence policy of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    #[default]
    None,
    Daily,
    Weekly,
}

impl RepeatPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatPolicy::None => "none",
            RepeatPolicy::Daily => "daily",
            RepeatPolicy::Weekly => "weekly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RepeatPolicy::None),
            "daily" => Some(RepeatPolicy::Daily),
            "weekly" => Some(RepeatPolicy::Weekly),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, RepeatPolicy::None)
    }
}

/// A task row, either persisted or synthesized at read time.
///
/// Timestamps are epoch milliseconds. `start_time` is a zero-padded `HH:MM`
/// string so that lexical order matches time-of-day order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub kind: TaskKind,
    pub category: String,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub repeat: RepeatPolicy,
    pub scheduled_date: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub overdue_notified: bool,

    // Provenance of derived rows
    pub rolled_over_from_task_id: Option<String>,
    pub original_created_at: Option<i64>,
    pub original_habit_id: Option<String>,
}

impl Task {
    /// A stored row describing a recurring habit, as opposed to one of its
    /// materialized occurrences.
    pub fn is_habit_definition(&self) -> bool {
        self.kind == TaskKind::Habit
            && self.repeat.is_recurring()
            && self.original_habit_id.is_none()
    }

    /// An undated (or past-dated), untimed, incomplete original task that
    /// is shown on today's listing.
    pub fn is_rollover_candidate(&self, today: NaiveDate) -> bool {
        !self.completed && self.can_roll_over_to(today)
    }

    /// Whether this row has the shape of a rollover origin for `date`,
    /// regardless of its completion state.
    pub fn can_roll_over_to(&self, date: NaiveDate) -> bool {
        self.kind == TaskKind::Task
            && self.start_time.is_none()
            && self.rolled_over_from_task_id.is_none()
            && self.scheduled_date.is_none_or(|d| d < date)
    }
}

/// Input for creating a real task row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub category: String,
    pub start_time: Option<String>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub repeat: RepeatPolicy,
    pub scheduled_date: Option<NaiveDate>,
}

/// Partial update of a real task row. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub start_time: Option<Option<String>>,
    pub duration_minutes: Option<Option<i64>>,
    pub repeat: Option<RepeatPolicy>,
    pub scheduled_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<i64>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.start_time.is_none()
            && self.duration_minutes.is_none()
            && self.repeat.is_none()
            && self.scheduled_date.is_none()
            && self.completed.is_none()
            && self.completed_at.is_none()
    }

    /// Update that sets the completion state and its timestamp together.
    pub fn completion(completed: bool, now: i64) -> Self {
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(now)),
            ..Default::default()
        }
    }
}

/// Wire shape of one listed task, real or virtual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub category: String,
    pub start_time: Option<String>,
    pub duration: Option<i64>,
    pub repeat: RepeatPolicy,
    pub completed: bool,
    pub scheduled_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub overdue_notified: bool,
    pub is_habit_instance: bool,
    pub original_habit_id: Option<String>,
    pub rolled_over_from_task_id: Option<String>,
    pub original_created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Convert epoch milliseconds to a UTC timestamp for the wire.
pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Validate a wall-clock `HH:MM` string.
pub fn is_valid_start_time(s: &str) -> bool {
    s.len() == 5 && chrono::NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undated_task() -> Task {
        Task {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            title: "Call plumber".to_string(),
            kind: TaskKind::Task,
            category: "personal".to_string(),
            start_time: None,
            duration_minutes: None,
            repeat: RepeatPolicy::None,
            scheduled_date: None,
            completed: false,
            completed_at: None,
            created_at: 0,
            overdue_notified: false,
            rolled_over_from_task_id: None,
            original_created_at: None,
            original_habit_id: None,
        }
    }

    #[test]
    fn kind_and_repeat_parse_their_own_names() {
        assert_eq!(TaskKind::from_str("habit"), Some(TaskKind::Habit));
        assert_eq!(TaskKind::from_str("Habit"), None);
        assert_eq!(RepeatPolicy::from_str("weekly"), Some(RepeatPolicy::Weekly));
        assert_eq!(RepeatPolicy::from_str("monthly"), None);
        assert_eq!(RepeatPolicy::Daily.as_str(), "daily");
    }

    #[test]
    fn start_time_requires_zero_padded_hours() {
        assert!(is_valid_start_time("07:30"));
        assert!(is_valid_start_time("23:59"));
        assert!(!is_valid_start_time("7:30"));
        assert!(!is_valid_start_time("24:00"));
        assert!(!is_valid_start_time("07:30:00"));
    }

    #[test]
    fn rollover_candidate_rules() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let task = undated_task();
        assert!(task.is_rollover_candidate(today));

        let past = Task {
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 9),
            ..undated_task()
        };
        assert!(past.is_rollover_candidate(today));

        let dated_today = Task {
            scheduled_date: Some(today),
            ..undated_task()
        };
        assert!(!dated_today.is_rollover_candidate(today));

        let timed = Task {
            start_time: Some("09:00".to_string()),
            ..undated_task()
        };
        assert!(!timed.is_rollover_candidate(today));

        let derived = Task {
            rolled_over_from_task_id: Some("t0".to_string()),
            ..undated_task()
        };
        assert!(!derived.is_rollover_candidate(today));
    }

    #[test]
    fn habit_occurrence_rows_are_not_definitions() {
        let def = Task {
            kind: TaskKind::Habit,
            repeat: RepeatPolicy::Daily,
            ..undated_task()
        };
        assert!(def.is_habit_definition());

        let occurrence = Task {
            original_habit_id: Some(def.id.clone()),
            ..def.clone()
        };
        assert!(!occurrence.is_habit_definition());
    }

    #[test]
    fn completion_update_sets_and_clears_timestamp() {
        let done = TaskUpdate::completion(true, 42);
        assert_eq!(done.completed, Some(true));
        assert_eq!(done.completed_at, Some(Some(42)));

        let undone = TaskUpdate::completion(false, 42);
        assert_eq!(undone.completed_at, Some(None));
    }

    #[test]
    fn new_task_accepts_wire_field_names() {
        let input: NewTask = serde_json::from_str(
            r#"{"title":"Meditate","type":"habit","repeat":"daily","duration":10,"startTime":"07:00"}"#,
        )
        .unwrap();
        assert_eq!(input.kind, TaskKind::Habit);
        assert_eq!(input.repeat, RepeatPolicy::Daily);
        assert_eq!(input.duration_minutes, Some(10));
        assert_eq!(input.start_time.as_deref(), Some("07:00"));
    }
}
