//! Request body and query helpers.

use crate::error::{ApiError, ApiResult};
use crate::types::{RepeatPolicy, TaskUpdate};
use chrono::NaiveDate;
use serde_json::Value;

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(field: &str, raw: &str) -> ApiResult<NaiveDate> {
    if raw.len() != 10 {
        return Err(ApiError::invalid_value(field, "expected a YYYY-MM-DD date"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid_value(field, "expected a YYYY-MM-DD date"))
}

/// Helper to get a string from a JSON body.
fn get_string(args: &Value, key: &str) -> ApiResult<Option<String>> {
    match args.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ApiError::invalid_value(
            key,
            &format!("{} must be a string", key),
        )),
    }
}

/// Helper for a clearable string: absent leaves it, `null` clears it.
fn get_nullable_string(args: &Value, key: &str) -> ApiResult<Option<Option<String>>> {
    match args.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(ApiError::invalid_value(
            key,
            &format!("{} must be a string or null", key),
        )),
    }
}

/// Helper for a clearable integer.
fn get_nullable_i64(args: &Value, key: &str) -> ApiResult<Option<Option<i64>>> {
    match args.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(v) => v.as_i64().map(|n| Some(Some(n))).ok_or_else(|| {
            ApiError::invalid_value(key, &format!("{} must be an integer or null", key))
        }),
    }
}

/// Helper to get a bool from a JSON body.
pub fn get_bool(args: &Value, key: &str) -> ApiResult<Option<bool>> {
    match args.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ApiError::invalid_value(
            key,
            &format!("{} must be a boolean", key),
        )),
    }
}

/// Build a partial update from a PATCH body.
pub fn task_update_from_json(args: &Value) -> ApiResult<TaskUpdate> {
    if !args.is_object() {
        return Err(ApiError::invalid_value("body", "expected a JSON object"));
    }

    let repeat = get_string(args, "repeat")?
        .map(|s| {
            RepeatPolicy::from_str(&s)
                .ok_or_else(|| ApiError::invalid_value("repeat", "repeat must be none, daily or weekly"))
        })
        .transpose()?;

    let scheduled_date = get_nullable_string(args, "scheduledDate")?
        .map(|date| date.map(|d| parse_date("scheduledDate", &d)).transpose())
        .transpose()?;

    let duration_minutes = match get_nullable_i64(args, "duration")? {
        Some(v) => Some(v),
        None => get_nullable_i64(args, "durationMinutes")?,
    };

    Ok(TaskUpdate {
        title: get_string(args, "title")?,
        category: get_string(args, "category")?,
        start_time: get_nullable_string(args, "startTime")?,
        duration_minutes,
        repeat,
        scheduled_date,
        completed: get_bool(args, "completed")?,
        completed_at: None,
    })
}
