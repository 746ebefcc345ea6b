//! Serde types for the backend's JSON payloads.
//!
//! The backend has drifted over time: some deployments return `user`,
//! others `user_id`; names appear as `fname`/`lname` or
//! `first_name`/`last_name`. Aliases absorb both generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One enrollment photo reference from `GET /photos/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserPhoto {
    #[serde(alias = "user")]
    pub user_id: i64,
    pub photo_path: String,
}

/// Server-side aggregated encodings from `GET /photos/get-encodings/`.
#[derive(Debug, Clone, Deserialize)]
pub struct EncodingRecord {
    #[serde(alias = "user")]
    pub user_id: i64,
    pub encodings: Vec<Vec<f32>>,
}

/// An attendance row. `check_out: null` marks an open visit.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceWire {
    pub attendance_id: i64,
    #[serde(alias = "user_id")]
    pub user: i64,
    pub check_in: DateTime<Utc>,
    #[serde(default)]
    pub check_out: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDetails {
    pub user_id: i64,
    #[serde(alias = "fname", default)]
    pub first_name: String,
    #[serde(alias = "lname", default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl UserDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeResponse {
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckInBody {
    pub user: i64,
    pub check_in: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckOutBody<'a> {
    pub check_out: DateTime<Utc>,
    pub duration: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyOtpBody<'a> {
    pub email: &'a str,
    pub otp_code: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogBody<'a> {
    pub user: i64,
    pub action: &'a str,
}
