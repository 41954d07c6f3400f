//! CLI command definitions for habit-planner
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::format::OutputFormat;
use crate::types::{RepeatPolicy, TaskKind};

/// Habit planner API server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server (default if no subcommand given)
    Serve(ServeArgs),

    /// Show the materialized task list for a date
    List(ListArgs),

    /// Create a task or habit
    Add(AddArgs),

    /// Complete a task by real or virtual id
    Complete(CompleteArgs),
}

/// Arguments for the serve subcommand
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Listen address (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the list subcommand
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Owner of the tasks
    #[arg(short, long)]
    pub user: String,

    /// Date to list (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub date: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Kind of row to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Task,
    Habit,
}

impl From<KindArg> for TaskKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Task => TaskKind::Task,
            KindArg::Habit => TaskKind::Habit,
        }
    }
}

/// Repeat policy of a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepeatArg {
    None,
    Daily,
    Weekly,
}

impl From<RepeatArg> for RepeatPolicy {
    fn from(repeat: RepeatArg) -> Self {
        match repeat {
            RepeatArg::None => RepeatPolicy::None,
            RepeatArg::Daily => RepeatPolicy::Daily,
            RepeatArg::Weekly => RepeatPolicy::Weekly,
        }
    }
}

/// Arguments for the add subcommand
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Owner of the task
    #[arg(short, long)]
    pub user: String,

    /// Task title
    pub title: String,

    /// Task or habit
    #[arg(short, long, value_enum, default_value = "task")]
    pub kind: KindArg,

    /// Repeat policy (habits only)
    #[arg(short, long, value_enum, default_value = "none")]
    pub repeat: RepeatArg,

    /// Free-form category tag
    #[arg(long, default_value = "")]
    pub category: String,

    /// Start time (HH:MM)
    #[arg(long)]
    pub start_time: Option<String>,

    /// Duration in minutes
    #[arg(long)]
    pub duration: Option<i64>,

    /// Scheduled date (YYYY-MM-DD); omit for an undated task
    #[arg(long)]
    pub date: Option<String>,
}

/// Arguments for the complete subcommand
#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Owner of the task
    #[arg(short, long)]
    pub user: String,

    /// Real id, habit occurrence id, or rollover id
    pub id: String,

    /// Mark the task incomplete again (real rows only)
    #[arg(long)]
    pub undo: bool,
}
