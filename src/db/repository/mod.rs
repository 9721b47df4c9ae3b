//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`; `SqliteLabStore` wraps them
//! behind the pipeline's collaborator traits.

mod lab_report;
mod patient;
mod store;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub use lab_report::*;
pub use patient::*;
pub use store::*;

// ═══════════════════════════════════════════
// Column codecs
// ═══════════════════════════════════════════

/// Timestamps are stored as RFC 3339 with microseconds, always in UTC,
/// so lexical order in SQL matches chronological order.
pub(crate) fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_optional_timestamp(
    field: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<FixedOffset>>, DatabaseError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s).map_err(|_| DatabaseError::InvalidValue {
            field: field.to_string(),
            value: s,
        })
    })
    .transpose()
}

pub(crate) fn parse_utc_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_are_stored_in_utc() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let ts = offset.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-10T10:30:00.000000Z");
    }

    #[test]
    fn timestamp_codec_preserves_instant() {
        let ts = Utc
            .with_ymd_and_hms(2024, 3, 10, 10, 30, 0)
            .unwrap()
            .fixed_offset();
        let parsed = parse_optional_timestamp("t", Some(format_timestamp(&ts)))
            .unwrap()
            .unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn corrupt_values_are_reported_with_field() {
        let err = parse_uuid("lab_reports.id", "not-a-uuid").unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidValue { ref field, .. } if field == "lab_reports.id"
        ));
        assert!(parse_optional_timestamp("x", Some("yesterday".into())).is_err());
        assert!(parse_optional_timestamp("x", None).unwrap().is_none());
    }
}
