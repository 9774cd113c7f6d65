//! Timestamp helpers shared by the stores.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at millisecond precision, so stored values round-trip exactly.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Filesystem-safe ISO-8601 stamp: `2026-01-02T03-04-05-678Z`.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-")
}
