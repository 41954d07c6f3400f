//! Output formatting utilities for markdown and JSON.

use crate::planner::Materialization;
use crate::types::TaskResponse;
use clap::ValueEnum;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    #[value(alias = "md")]
    Markdown,
}

/// Format a single task as a markdown list item.
pub fn format_task_markdown(task: &TaskResponse) -> String {
    let check = if task.completed { "x" } else { " " };
    let mut md = format!("- [{}] ", check);

    if let Some(ref start_time) = task.start_time {
        md.push_str(&format!("{} ", start_time));
    }
    md.push_str(&task.title);

    let mut notes = Vec::new();
    if !task.category.is_empty() {
        notes.push(task.category.clone());
    }
    if let Some(duration) = task.duration {
        notes.push(format!("{}m", duration));
    }
    if task.is_habit_instance {
        notes.push("habit".to_string());
    }
    if task.rolled_over_from_task_id.is_some() {
        notes.push("carried over".to_string());
    }
    if !notes.is_empty() {
        md.push_str(&format!(" ({})", notes.join(", ")));
    }

    md.push_str(&format!(" `{}`\n", task.id));
    md
}

/// Format a day's listing as markdown.
pub fn format_listing_markdown(listing: &Materialization) -> String {
    let mut md = format!("# Tasks for {} ({})\n\n", listing.date, listing.tasks.len());

    if listing.tasks.is_empty() {
        md.push_str("_Nothing planned._\n");
    }
    for task in listing.responses() {
        md.push_str(&format_task_markdown(&task));
    }

    if !listing.skipped.is_empty() {
        md.push_str(&format!("\n_{} malformed entries skipped._\n", listing.skipped.len()));
    }
    md
}

/// Format a listing in the requested output format.
pub fn format_listing(listing: &Materialization, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&listing.responses()),
        OutputFormat::Markdown => Ok(format_listing_markdown(listing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::to_response;
    use crate::types::{RepeatPolicy, Task, TaskKind};
    use chrono::NaiveDate;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            title: "Stretch".to_string(),
            kind: TaskKind::Task,
            category: "fitness".to_string(),
            start_time: Some("06:30".to_string()),
            duration_minutes: Some(10),
            repeat: RepeatPolicy::None,
            scheduled_date: None,
            completed: true,
            completed_at: None,
            created_at: 0,
            overdue_notified: false,
            rolled_over_from_task_id: None,
            original_created_at: None,
            original_habit_id: None,
        }
    }

    #[test]
    fn output_format_parses_aliases() {
        assert_eq!(OutputFormat::from_str("json", true), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("md", true), Ok(OutputFormat::Markdown));
        assert!(OutputFormat::from_str("yaml", true).is_err());
    }

    #[test]
    fn task_line_shows_time_title_and_notes() {
        let line = format_task_markdown(&to_response(&task()));
        assert_eq!(line, "- [x] 06:30 Stretch (fitness, 10m) `t1`\n");
    }

    #[test]
    fn empty_listing_says_so() {
        let listing = Materialization {
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            tasks: vec![],
            skipped: vec![],
        };
        let md = format_listing_markdown(&listing);
        assert!(md.starts_with("# Tasks for 2024-01-10 (0)"));
        assert!(md.contains("Nothing planned"));
    }
}
