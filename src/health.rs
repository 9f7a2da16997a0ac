//! Health reporting.

use serde::Serialize;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Message reported by every health check.
pub const HEALTH_MESSAGE: &str = "Gemma API Proxy Server is running";

/// ISO-8601 in UTC with millisecond precision, e.g. `2026-10-19T12:00:00.123Z`.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Health check response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    /// Always `"ok"`.
    #[schema(example = "ok")]
    pub status: &'static str,
    /// Human readable status line.
    #[schema(example = "Gemma API Proxy Server is running")]
    pub message: &'static str,
    /// Time the check was answered.
    #[schema(example = "2026-10-19T12:00:00.123Z")]
    pub timestamp: String,
}

impl HealthStatus {
    /// Build a status stamped with the given instant.
    pub fn at(now: OffsetDateTime) -> Self {
        Self {
            status: "ok",
            message: HEALTH_MESSAGE,
            timestamp: format_timestamp(now),
        }
    }

    /// Build a status stamped with the current time.
    pub fn now() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }
}

/// Format an instant as a UTC ISO-8601 timestamp.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let utc = at.to_offset(time::UtcOffset::UTC);
    // Fixed descriptions only fail on missing components, which UTC datetimes always have.
    utc.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}
