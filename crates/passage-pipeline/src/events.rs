//! Discrete events emitted by the pipeline, consumable by any
//! presentation layer (log sink, CLI, GUI) without the core depending on
//! how they are rendered.

use chrono::{DateTime, Utc};
use passage_core::IdentityId;

/// Attendance transition direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
}

impl std::fmt::Display for AttendanceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceAction::CheckIn => f.write_str("check-in"),
            AttendanceAction::CheckOut => f.write_str("check-out"),
        }
    }
}

/// Why access was denied. Denial and backend unavailability render the
/// same to the user but stay distinguishable in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Liveness gate rejected the observation.
    Spoof,
    /// Attendance store or verifier could not be reached.
    BackendUnavailable,
    /// Fallback one-time code was rejected.
    CodeRejected,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// A recognized, live identity toggled attendance.
    Accepted {
        identity: IdentityId,
        action: AttendanceAction,
        timestamp: DateTime<Utc>,
        display_name: String,
    },
    Denied {
        reason: DenialReason,
    },
    /// Sustained unknown presence triggered the fallback flow.
    Escalated,
    /// The fallback flow finished, successfully or not.
    Resolved {
        identity: Option<IdentityId>,
    },
}
