//! Cron expression validation and next-run previews.
//!
//! Only standard 5-field expressions are accepted. Invalid input is a
//! normal result ([`CronCheck::is_valid`] is false), never an error;
//! [`validate_cron`] is the fail-fast wrapper for non-interactive callers.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use croner::Cron;
use serde::Serialize;

use crate::config::DEFAULT_TIMEZONE;
use crate::error::{Error, Result};

/// Number of upcoming runs computed when the caller does not ask for a count.
pub const DEFAULT_RUN_COUNT: usize = 5;

/// Upper bound on upcoming runs computed per call; larger counts are capped.
pub const MAX_RUN_COUNT: usize = 1000;

/// A named schedule offered to users.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CronPreset {
    pub name: &'static str,
    pub expression: &'static str,
    pub description: &'static str,
}

pub const CRON_PRESETS: &[CronPreset] = &[
    CronPreset {
        name: "every-minute",
        expression: "* * * * *",
        description: "Every minute",
    },
    CronPreset {
        name: "hourly",
        expression: "0 * * * *",
        description: "At minute 0 of every hour",
    },
    CronPreset {
        name: "daily",
        expression: "0 0 * * *",
        description: "Every day at midnight",
    },
    CronPreset {
        name: "weekly",
        expression: "0 0 * * 0",
        description: "Every Sunday at midnight",
    },
    CronPreset {
        name: "monthly",
        expression: "0 0 1 * *",
        description: "First day of every month at midnight",
    },
];

/// Look up a preset by name.
pub fn find_preset(name: &str) -> Option<&'static CronPreset> {
    CRON_PRESETS.iter().find(|p| p.name == name)
}

/// Outcome of checking a cron expression.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronCheck {
    pub is_valid: bool,
    /// Upcoming runs in the requested timezone, ascending.
    pub next_runs: Vec<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CronCheck {
    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            next_runs: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Check `expression` and compute the next `count` runs after now.
///
/// `count` is capped at [`MAX_RUN_COUNT`].
pub fn parse_cron(expression: &str, timezone: Option<&str>, count: Option<usize>) -> CronCheck {
    parse_cron_at(expression, timezone, count, Utc::now())
}

/// Same as [`parse_cron`] with an explicit reference time.
pub fn parse_cron_at(
    expression: &str,
    timezone: Option<&str>,
    count: Option<usize>,
    now: DateTime<Utc>,
) -> CronCheck {
    let tz = match parse_timezone(timezone.unwrap_or(DEFAULT_TIMEZONE)) {
        Ok(tz) => tz,
        Err(e) => return CronCheck::invalid(e),
    };

    let cron = match compile(expression) {
        Ok(cron) => cron,
        Err(e) => return CronCheck::invalid(e),
    };

    let count = count.unwrap_or(DEFAULT_RUN_COUNT).min(MAX_RUN_COUNT);
    let mut next_runs = Vec::with_capacity(count);
    let mut cursor = now.with_timezone(&tz);

    while next_runs.len() < count {
        match cron.find_next_occurrence(&cursor, false) {
            Ok(next) => {
                next_runs.push(next.fixed_offset());
                cursor = next;
            }
            Err(e) => {
                return CronCheck::invalid(format!("Could not compute next run: {}", e));
            }
        }
    }

    CronCheck {
        is_valid: true,
        next_runs,
        error: None,
    }
}

/// Fail-fast validation: returns the next runs or a validation error.
pub fn validate_cron(
    expression: &str,
    timezone: Option<&str>,
) -> Result<Vec<DateTime<FixedOffset>>> {
    let check = parse_cron(expression, timezone, None);
    if check.is_valid {
        return Ok(check.next_runs);
    }

    let reason = check.error.unwrap_or_else(|| "invalid expression".to_string());
    let presets = CRON_PRESETS
        .iter()
        .map(|p| format!("{} ({})", p.name, p.expression))
        .collect::<Vec<_>>()
        .join(", ");
    Err(
        Error::validation(format!("Invalid cron expression '{}': {}", expression, reason))
            .with_hint(format!("Use a 5-field expression or a preset: {}", presets)),
    )
}

/// Validate an IANA timezone name.
pub fn validate_timezone(timezone: &str) -> Result<Tz> {
    parse_timezone(timezone).map_err(|e| {
        Error::validation(e).with_hint("Use an IANA name such as 'UTC' or 'Europe/Berlin'")
    })
}

fn parse_timezone(raw: &str) -> std::result::Result<Tz, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Tz::UTC);
    }

    trimmed
        .parse::<Tz>()
        .map_err(|_| format!("Invalid timezone '{}'", raw))
}

fn compile(expression: &str) -> std::result::Result<Cron, String> {
    let fields = expression.split_whitespace().count();
    if fields != 5 {
        return Err(format!(
            "Expected 5 fields (minute hour day month weekday), got {}",
            fields
        ));
    }

    Cron::new(expression.trim())
        .parse()
        .map_err(|e| e.to_string())
}
