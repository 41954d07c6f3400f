//! Habit Planner Library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod planner;
pub mod types;
