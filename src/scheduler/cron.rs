//! Cron expression handling.
//!
//! Supports 5-field expressions (minute hour day-of-month month
//! day-of-week) with `*`, `*/step` and comma lists. Next-run search walks
//! forward minute by minute, capped at one year. Evaluation is UTC;
//! stored timezone labels are display-only.
//!
//! A preset table and a small heuristic resolver turn common phrases
//! ("daily at 9am") into expressions; unmatched phrasing is rejected
//! rather than guessed at.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{Result, RoostError};

/// Preset phrases and their expressions, checked case-insensitively.
const PRESETS: &[(&str, &str)] = &[
    ("every minute", "* * * * *"),
    ("every hour", "0 * * * *"),
    ("hourly", "0 * * * *"),
    ("daily at 9am", "0 9 * * *"),
    ("daily at noon", "0 12 * * *"),
    ("daily at midnight", "0 0 * * *"),
    ("daily", "0 9 * * *"),
    ("every morning", "0 9 * * *"),
    ("weekdays at 9am", "0 9 * * 1,2,3,4,5"),
    ("weekly", "0 9 * * 1"),
    ("every monday", "0 9 * * 1"),
    ("monthly", "0 9 1 * *"),
];

fn parse_cron_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }
    if let Some(step_str) = field.strip_prefix("*/") {
        let step = step_str.parse::<u32>().ok()?;
        if step == 0 {
            return None;
        }
        return Some((min..=max).step_by(step as usize).collect());
    }

    let mut values = Vec::new();
    for part in field.split(',') {
        let value = part.parse::<u32>().ok()?;
        if !(min..=max).contains(&value) {
            return None;
        }
        values.push(value);
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn next_run_opt(expr: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }

    let minutes = parse_cron_field(fields[0], 0, 59)?;
    let hours = parse_cron_field(fields[1], 0, 23)?;
    let dom = parse_cron_field(fields[2], 1, 31)?;
    let month = parse_cron_field(fields[3], 1, 12)?;
    let dow = parse_cron_field(fields[4], 0, 6)?;

    let mut candidate = now.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
    let limit = candidate + Duration::days(366);

    while candidate <= limit {
        if minutes.contains(&candidate.minute())
            && hours.contains(&candidate.hour())
            && dom.contains(&candidate.day())
            && month.contains(&candidate.month())
            && dow.contains(&candidate.weekday().num_days_from_sunday())
        {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Validate an expression and return the first run strictly after `now`.
pub fn next_run_after(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    next_run_opt(expr, now)
        .ok_or_else(|| RoostError::Schedule(format!("invalid cron expression: {}", expr)))
}

/// Whether an expression parses and has a future run time.
pub fn is_valid(expr: &str) -> bool {
    next_run_opt(expr, Utc::now()).is_some()
}

/// Resolve caller input into a cron expression.
///
/// Raw valid expressions pass through; otherwise the preset table is
/// consulted (substring, case-insensitive). Anything else is an error.
pub fn resolve_expression(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if is_valid(trimmed) {
        return Ok(trimmed.to_string());
    }

    let lower = trimmed.to_lowercase();
    for (phrase, expr) in PRESETS {
        if lower.contains(phrase) {
            return Ok(expr.to_string());
        }
    }

    Err(RoostError::Schedule(format!(
        "could not interpret schedule '{}'; use a 5-field cron expression or a \
         phrase like 'daily at 9am'",
        input
    )))
}
