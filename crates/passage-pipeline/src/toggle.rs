//! Attendance toggle direction.
//!
//! The per-identity in/out state lives in the remote store, never locally:
//! the latest record decides whether the next transition is a check-in or
//! a check-out. At most one open record (null check-out) exists per
//! identity.

use crate::events::AttendanceAction;
use chrono::{DateTime, Utc};
use passage_core::IdentityId;

/// The shape of a store attendance record the pipeline depends on.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: String,
    pub identity: IdentityId,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }
}

/// Decide the next transition from the latest record for an identity.
pub fn next_action(latest: Option<&AttendanceRecord>) -> AttendanceAction {
    match latest {
        Some(record) if record.is_open() => AttendanceAction::CheckOut,
        _ => AttendanceAction::CheckIn,
    }
}

/// Elapsed time of a closed visit, formatted `H:MM:SS` for the store's
/// duration field.
pub fn format_duration(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> String {
    let total = (check_out - check_in).num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
