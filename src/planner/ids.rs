//! Virtual task identifiers.
//!
//! Virtual rows carry ids that encode their origin, so a completion request
//! can be routed without a lookup table:
//!
//! - habit occurrence: `<habitId>-<YYYY-MM-DD>`
//! - rollover carry: `rollover-<originId>-<YYYY-MM-DD>`
//!
//! Origin ids are 36-character UUID strings. Parsing is strict: anything that
//! does not match exactly is never treated as a virtual id.

use chrono::NaiveDate;
use regex_lite::Regex;
use std::sync::LazyLock;

pub const ROLLOVER_PREFIX: &str = "rollover-";

/// Length of a hyphenated UUID string.
pub const ORIGIN_ID_LEN: usize = 36;

/// Longest id accepted as a real row id.
const MAX_REAL_ID_LEN: usize = 64;

const DATE_FORMAT: &str = "%Y-%m-%d";

static HABIT_VIRTUAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Za-z-]{36})-(\d{4}-\d{2}-\d{2})$").expect("habit id pattern compiles")
});

static ROLLOVER_VIRTUAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rollover-([0-9A-Za-z-]{36})-(\d{4}-\d{2}-\d{2})$")
        .expect("rollover id pattern compiles")
});

/// What a task identifier refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// A persisted row id.
    Real(String),
    /// The occurrence of a habit definition on a date.
    HabitVirtual { habit_id: String, date: NaiveDate },
    /// An undated task carried over to a date.
    RolloverVirtual { origin_id: String, date: NaiveDate },
    /// Not a usable identifier of any shape.
    Invalid,
}

impl TaskRef {
    /// Classify a raw identifier by shape.
    ///
    /// The shape decides, not a storage lookup: the `rollover-` prefix is
    /// checked first, then the habit pattern, then the real-id charset.
    /// Generated row ids are bare UUIDs and can never take a virtual shape.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with(ROLLOVER_PREFIX) {
            return match parse_rollover_virtual_id(raw) {
                Some((origin_id, date)) => TaskRef::RolloverVirtual { origin_id, date },
                None => TaskRef::Invalid,
            };
        }

        if let Some((habit_id, date)) = parse_habit_virtual_id(raw) {
            return TaskRef::HabitVirtual { habit_id, date };
        }

        if is_valid_real_id(raw) {
            TaskRef::Real(raw.to_string())
        } else {
            TaskRef::Invalid
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            TaskRef::HabitVirtual { .. } | TaskRef::RolloverVirtual { .. }
        )
    }
}

fn is_valid_real_id(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_REAL_ID_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Whether an origin id can round-trip through a virtual id.
pub fn is_reversible_origin_id(id: &str) -> bool {
    id.len() == ORIGIN_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub fn habit_virtual_id(habit_id: &str, date: NaiveDate) -> String {
    format!("{}-{}", habit_id, date.format(DATE_FORMAT))
}

pub fn rollover_virtual_id(origin_id: &str, date: NaiveDate) -> String {
    format!("{}{}-{}", ROLLOVER_PREFIX, origin_id, date.format(DATE_FORMAT))
}

pub fn parse_habit_virtual_id(raw: &str) -> Option<(String, NaiveDate)> {
    split_captures(&HABIT_VIRTUAL_ID, raw)
}

pub fn parse_rollover_virtual_id(raw: &str) -> Option<(String, NaiveDate)> {
    split_captures(&ROLLOVER_VIRTUAL_ID, raw)
}

fn split_captures(pattern: &Regex, raw: &str) -> Option<(String, NaiveDate)> {
    let caps = pattern.captures(raw)?;
    let id = caps.get(1)?.as_str();
    let date = NaiveDate::parse_from_str(caps.get(2)?.as_str(), DATE_FORMAT).ok()?;
    Some((id.to_string(), date))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HABIT: &str = "0190f5a2-7c4e-7b3a-9f1e-2d3c4b5a6978";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn habit_virtual_id_round_trips() {
        let id = habit_virtual_id(HABIT, date(2024, 1, 10));
        assert_eq!(id, format!("{}-2024-01-10", HABIT));
        assert_eq!(
            TaskRef::parse(&id),
            TaskRef::HabitVirtual {
                habit_id: HABIT.to_string(),
                date: date(2024, 1, 10)
            }
        );
    }

    #[test]
    fn rollover_virtual_id_round_trips() {
        let id = rollover_virtual_id(HABIT, date(2024, 2, 29));
        assert_eq!(id, format!("rollover-{}-2024-02-29", HABIT));
        assert_eq!(
            TaskRef::parse(&id),
            TaskRef::RolloverVirtual {
                origin_id: HABIT.to_string(),
                date: date(2024, 2, 29)
            }
        );
    }

    #[test]
    fn bare_uuid_is_a_real_id() {
        assert_eq!(TaskRef::parse(HABIT), TaskRef::Real(HABIT.to_string()));
        assert!(!TaskRef::parse(HABIT).is_virtual());
    }

    #[test]
    fn short_prefix_is_not_a_habit_occurrence() {
        // 35-character prefix: still a syntactically valid real id, never a habit virtual
        let raw = format!("{}-2024-01-10", &HABIT[1..]);
        assert_eq!(TaskRef::parse(&raw), TaskRef::Real(raw.clone()));
        assert_eq!(parse_habit_virtual_id(&raw), None);
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert_eq!(parse_habit_virtual_id(&format!("{}-2023-02-29", HABIT)), None);
        assert_eq!(
            TaskRef::parse(&format!("rollover-{}-2024-13-01", HABIT)),
            TaskRef::Invalid
        );
    }

    #[test]
    fn malformed_rollover_ids_are_invalid() {
        assert_eq!(TaskRef::parse("rollover-abc-2024-01-10"), TaskRef::Invalid);
        assert_eq!(TaskRef::parse("rollover-"), TaskRef::Invalid);
        assert_eq!(
            TaskRef::parse(&format!("rollover-{}-2024-01-1", HABIT)),
            TaskRef::Invalid
        );
    }

    #[test]
    fn unsafe_or_empty_ids_are_invalid() {
        assert_eq!(TaskRef::parse(""), TaskRef::Invalid);
        assert_eq!(TaskRef::parse("a b"), TaskRef::Invalid);
        assert_eq!(TaskRef::parse("../etc"), TaskRef::Invalid);
        assert_eq!(TaskRef::parse(&"x".repeat(65)), TaskRef::Invalid);
    }

    #[test]
    fn distinct_habits_never_share_virtual_ids() {
        let other = "0190f5a2-7c4e-7b3a-9f1e-2d3c4b5a6979";
        let day = date(2024, 1, 10);
        assert_ne!(habit_virtual_id(HABIT, day), habit_virtual_id(other, day));
    }

    #[test]
    fn reversible_origin_ids_are_uuid_length() {
        assert!(is_reversible_origin_id(HABIT));
        assert!(!is_reversible_origin_id("t1"));
    }
}
