//! Task row storage.

use super::Database;
use super::repository::TaskRepository;
use crate::types::{RepeatPolicy, Task, TaskKind, TaskUpdate};
use anyhow::{Result, bail};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let kind: String = row.get("kind")?;
    let repeat: String = row.get("repeat")?;
    let scheduled_date: Option<String> = row.get("scheduled_date")?;

    let kind = TaskKind::from_str(&kind)
        .ok_or_else(|| conversion_error(3, format!("unknown task kind '{}'", kind)))?;
    let repeat = RepeatPolicy::from_str(&repeat)
        .ok_or_else(|| conversion_error(7, format!("unknown repeat policy '{}'", repeat)))?;
    let scheduled_date = scheduled_date
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| conversion_error(8, format!("bad scheduled_date '{}': {}", s, e)))
        })
        .transpose()?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        kind,
        category: row.get("category")?,
        start_time: row.get("start_time")?,
        duration_minutes: row.get("duration_minutes")?,
        repeat,
        scheduled_date,
        completed: row.get("completed")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        overdue_notified: row.get("overdue_notified")?,
        rolled_over_from_task_id: row.get("rolled_over_from_task_id")?,
        original_created_at: row.get("original_created_at")?,
        original_habit_id: row.get("original_habit_id")?,
    })
}

/// Run a row query, dropping rows that fail to decode.
///
/// One corrupt row must not hide the rest of a user's list.
fn query_tasks<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, parse_task_row)?;

    let mut tasks = Vec::new();
    for row in rows {
        match row {
            Ok(task) => tasks.push(task),
            Err(e) => warn!(error = %e, "Skipping undecodable task row"),
        }
    }
    Ok(tasks)
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1",
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

impl TaskRepository for Database {
    fn list_by_user_and_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks
                 WHERE user_id = ?1 AND scheduled_date = ?2
                 ORDER BY created_at",
                params![user_id, format_date(date)],
            )
        })
    }

    fn list_undated_incomplete(&self, user_id: &str, today: NaiveDate) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks
                 WHERE user_id = ?1
                   AND kind = 'task'
                   AND completed = 0
                   AND start_time IS NULL
                   AND rolled_over_from_task_id IS NULL
                   AND (scheduled_date IS NULL OR scheduled_date < ?2)
                 ORDER BY created_at",
                params![user_id, format_date(today)],
            )
        })
    }

    fn list_habit_definitions(&self, user_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks
                 WHERE user_id = ?1
                   AND kind = 'habit'
                   AND repeat IN ('daily', 'weekly')
                   AND original_habit_id IS NULL
                 ORDER BY created_at",
                params![user_id],
            )
        })
    }

    fn find_habit_occurrences(
        &self,
        user_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "SELECT * FROM tasks
                 WHERE user_id = ?1 AND original_habit_id = ?2 AND scheduled_date = ?3
                 ORDER BY created_at",
                params![user_id, habit_id, format_date(date)],
            )
        })
    }

    fn get_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    fn insert(&self, task: &Task) -> Result<()> {
        if task.rolled_over_from_task_id.is_some() && task.original_habit_id.is_some() {
            bail!(
                "Task {} cannot be both a rollover and a habit occurrence",
                task.id
            );
        }

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, user_id, title, kind, category, start_time, duration_minutes,
                    repeat, scheduled_date, completed, completed_at, created_at,
                    overdue_notified, rolled_over_from_task_id, original_created_at,
                    original_habit_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.id,
                    task.user_id,
                    task.title,
                    task.kind.as_str(),
                    task.category,
                    task.start_time,
                    task.duration_minutes,
                    task.repeat.as_str(),
                    task.scheduled_date.map(format_date),
                    task.completed,
                    task.completed_at,
                    task.created_at,
                    task.overdue_notified,
                    task.rolled_over_from_task_id,
                    task.original_created_at,
                    task.original_habit_id,
                ],
            )?;
            Ok(())
        })
    }

    fn update_fields(
        &self,
        user_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Option<Task>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(task) = get_task_internal(&tx, task_id)?.filter(|t| t.user_id == user_id)
            else {
                return Ok(None);
            };

            let updated = Task {
                title: update.title.clone().unwrap_or(task.title.clone()),
                category: update.category.clone().unwrap_or(task.category.clone()),
                start_time: update.start_time.clone().unwrap_or(task.start_time.clone()),
                duration_minutes: update.duration_minutes.unwrap_or(task.duration_minutes),
                repeat: update.repeat.unwrap_or(task.repeat),
                scheduled_date: update.scheduled_date.unwrap_or(task.scheduled_date),
                completed: update.completed.unwrap_or(task.completed),
                completed_at: update.completed_at.unwrap_or(task.completed_at),
                ..task
            };

            let changed = tx.execute(
                "UPDATE tasks SET
                    title = ?1, category = ?2, start_time = ?3, duration_minutes = ?4,
                    repeat = ?5, scheduled_date = ?6, completed = ?7, completed_at = ?8
                WHERE id = ?9 AND user_id = ?10",
                params![
                    updated.title,
                    updated.category,
                    updated.start_time,
                    updated.duration_minutes,
                    updated.repeat.as_str(),
                    updated.scheduled_date.map(format_date),
                    updated.completed,
                    updated.completed_at,
                    task_id,
                    user_id,
                ],
            )?;

            tx.commit()?;

            Ok((changed > 0).then_some(updated))
        })
    }

    fn delete(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: &str, user_id: &str) -> Task {
        Task {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: format!("Task {}", id),
            kind: TaskKind::Task,
            category: "work".to_string(),
            start_time: None,
            duration_minutes: None,
            repeat: RepeatPolicy::None,
            scheduled_date: None,
            completed: false,
            completed_at: None,
            created_at: 1_000,
            overdue_notified: false,
            rolled_over_from_task_id: None,
            original_created_at: None,
            original_habit_id: None,
        }
    }

    #[test]
    fn insert_then_get_round_trips_all_columns() {
        let db = Database::open_in_memory().unwrap();
        let original = Task {
            start_time: Some("08:15".to_string()),
            duration_minutes: Some(25),
            scheduled_date: Some(date(2024, 1, 10)),
            original_created_at: Some(500),
            original_habit_id: Some("h1".to_string()),
            kind: TaskKind::Habit,
            repeat: RepeatPolicy::Daily,
            ..task("a", "u1")
        };
        db.insert(&original).unwrap();

        assert_eq!(db.get_by_id("a").unwrap(), Some(original));
        assert_eq!(db.get_by_id("missing").unwrap(), None);
    }

    #[test]
    fn insert_rejects_rows_with_both_provenance_links() {
        let db = Database::open_in_memory().unwrap();
        let bad = Task {
            rolled_over_from_task_id: Some("o".to_string()),
            original_habit_id: Some("h".to_string()),
            ..task("a", "u1")
        };
        assert!(db.insert(&bad).is_err());
    }

    #[test]
    fn list_by_date_is_partitioned_by_user() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 1, 10);
        db.insert(&Task { scheduled_date: Some(day), ..task("a", "u1") }).unwrap();
        db.insert(&Task { scheduled_date: Some(day), ..task("b", "u2") }).unwrap();
        db.insert(&Task { scheduled_date: Some(date(2024, 1, 11)), ..task("c", "u1") })
            .unwrap();

        let ids: Vec<String> = db
            .list_by_user_and_date("u1", day)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn undated_incomplete_applies_candidate_filters() {
        let db = Database::open_in_memory().unwrap();
        let today = date(2024, 1, 10);
        db.insert(&task("undated", "u1")).unwrap();
        db.insert(&Task { scheduled_date: Some(date(2024, 1, 9)), ..task("past", "u1") })
            .unwrap();
        db.insert(&Task { scheduled_date: Some(today), ..task("today", "u1") }).unwrap();
        db.insert(&Task { completed: true, ..task("done", "u1") }).unwrap();
        db.insert(&Task { start_time: Some("09:00".to_string()), ..task("timed", "u1") })
            .unwrap();
        db.insert(&Task { kind: TaskKind::Habit, ..task("habit", "u1") }).unwrap();
        db.insert(&Task {
            rolled_over_from_task_id: Some("undated".to_string()),
            ..task("derived", "u1")
        })
        .unwrap();
        db.insert(&task("other-user", "u2")).unwrap();

        let mut ids: Vec<String> = db
            .list_undated_incomplete("u1", today)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["past", "undated"]);
    }

    #[test]
    fn habit_definitions_exclude_occurrences_and_one_off_habits() {
        let db = Database::open_in_memory().unwrap();
        let def = Task {
            kind: TaskKind::Habit,
            repeat: RepeatPolicy::Daily,
            ..task("def", "u1")
        };
        db.insert(&def).unwrap();
        db.insert(&Task {
            id: "occ".to_string(),
            original_habit_id: Some("def".to_string()),
            scheduled_date: Some(date(2024, 1, 10)),
            ..def.clone()
        })
        .unwrap();
        db.insert(&Task { kind: TaskKind::Habit, ..task("once", "u1") }).unwrap();

        let ids: Vec<String> = db
            .list_habit_definitions("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["def"]);

        let occurrences = db.find_habit_occurrences("u1", "def", date(2024, 1, 10)).unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].id, "occ");
    }

    #[test]
    fn update_is_conditional_on_owner() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&task("a", "u1")).unwrap();

        let update = TaskUpdate::completion(true, 2_000);
        assert_eq!(db.update_fields("u2", "a", &update).unwrap(), None);

        let updated = db.update_fields("u1", "a", &update).unwrap().unwrap();
        assert!(updated.completed);
        assert_eq!(updated.completed_at, Some(2_000));
        assert_eq!(db.get_by_id("a").unwrap(), Some(updated));
    }

    #[test]
    fn update_can_clear_nullable_fields() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&Task {
            start_time: Some("10:00".to_string()),
            scheduled_date: Some(date(2024, 1, 10)),
            ..task("a", "u1")
        })
        .unwrap();

        let update = TaskUpdate {
            start_time: Some(None),
            scheduled_date: Some(None),
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = db.update_fields("u1", "a", &update).unwrap().unwrap();
        assert_eq!(updated.start_time, None);
        assert_eq!(updated.scheduled_date, None);
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.category, "work");
    }

    #[test]
    fn delete_only_removes_own_rows() {
        let db = Database::open_in_memory().unwrap();
        db.insert(&task("a", "u1")).unwrap();

        assert!(!db.delete("u2", "a").unwrap());
        assert!(db.delete("u1", "a").unwrap());
        assert!(!db.delete("u1", "a").unwrap());
    }

    #[test]
    fn undecodable_rows_are_skipped_in_lists() {
        let db = Database::open_in_memory().unwrap();
        let day = date(2024, 1, 10);
        db.insert(&Task { scheduled_date: Some(day), ..task("good", "u1") }).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, user_id, title, kind, scheduled_date, created_at)
                 VALUES ('bad', 'u1', 'Bad', 'chore', '2024-01-10', 1)",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let tasks = db.list_by_user_and_date("u1", day).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "good");
    }
}
