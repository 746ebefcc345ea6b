//! The blocking REST client.

use crate::wire::{
    AttendanceWire, CheckInBody, CheckOutBody, EncodingRecord, LogBody, UserDetails, UserPhoto,
    VerifyCodeResponse, VerifyOtpBody,
};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },
}

pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Enrollment photo references for every user.
    pub fn user_photos(&self) -> Result<Vec<UserPhoto>, ApiError> {
        let url = self.url("/photos/");
        let resp = self.http.get(&url).send()?;
        expect_status(&url, resp.status(), StatusCode::OK)?;
        Ok(resp.json()?)
    }

    /// Precomputed encodings, for deployments where the backend encodes
    /// server-side.
    pub fn aggregated_encodings(&self) -> Result<Vec<EncodingRecord>, ApiError> {
        let url = self.url("/photos/get-encodings/");
        let resp = self.http.get(&url).send()?;
        expect_status(&url, resp.status(), StatusCode::OK)?;
        Ok(resp.json()?)
    }

    /// Attendance rows for one user, oldest first.
    pub fn attendance_for(&self, user_id: i64) -> Result<Vec<AttendanceWire>, ApiError> {
        let url = format!("{}?user_id={user_id}", self.url("/attendance/"));
        let resp = self.http.get(&url).send()?;
        expect_status(&url, resp.status(), StatusCode::OK)?;
        Ok(resp.json()?)
    }

    /// Open a new visit. The backend answers 201 on success.
    pub fn create_check_in(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), ApiError> {
        let url = self.url("/attendance/");
        let body = CheckInBody {
            user: user_id,
            check_in: at,
        };
        let resp = self.http.post(&url).json(&body).send()?;
        expect_status(&url, resp.status(), StatusCode::CREATED)
    }

    /// Close an open visit, recording the formatted duration.
    pub fn patch_check_out(
        &self,
        attendance_id: i64,
        at: DateTime<Utc>,
        duration: &str,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/attendance/{attendance_id}/"));
        let body = CheckOutBody {
            check_out: at,
            duration,
        };
        let resp = self.http.patch(&url).json(&body).send()?;
        expect_status(&url, resp.status(), StatusCode::OK)
    }

    pub fn user(&self, user_id: i64) -> Result<UserDetails, ApiError> {
        let url = self.url(&format!("/users/{user_id}/"));
        let resp = self.http.get(&url).send()?;
        expect_status(&url, resp.status(), StatusCode::OK)?;
        Ok(resp.json()?)
    }

    /// Look a user up by their 8-digit entry code. `Ok(None)` means the
    /// code is not associated with anyone.
    pub fn user_by_code(&self, code: &str) -> Result<Option<UserDetails>, ApiError> {
        let url = self.url(&format!("/users/by-code/{code}/"));
        let resp = self.http.get(&url).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        expect_status(&url, resp.status(), StatusCode::OK)?;
        Ok(Some(resp.json()?))
    }

    /// Verify a one-time code sent out of band. `Ok(None)` is a rejected
    /// code; transport and server faults are errors.
    pub fn verify_otp(&self, email: &str, otp_code: &str) -> Result<Option<i64>, ApiError> {
        let url = self.url("/users/verify-otp/");
        let body = VerifyOtpBody { email, otp_code };
        let resp = self.http.post(&url).json(&body).send()?;
        let status = resp.status();
        if status == StatusCode::OK {
            let parsed: VerifyCodeResponse = resp.json()?;
            return Ok(parsed.user_id);
        }
        if status.is_client_error() {
            tracing::debug!(%status, "verification rejected by backend");
            return Ok(None);
        }
        Err(ApiError::Status { status, url })
    }

    /// Append a human-readable line to the backend's audit log. Failures
    /// are reported, not fatal.
    pub fn post_log(&self, user_id: i64, action: &str) -> Result<(), ApiError> {
        let url = self.url("/logs/");
        let body = LogBody {
            user: user_id,
            action,
        };
        let resp = self.http.post(&url).json(&body).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status { status, url });
        }
        Ok(())
    }

    /// Download an enrollment photo as raw bytes.
    pub fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.http.get(url).send()?;
        expect_status(url, resp.status(), StatusCode::OK)?;
        Ok(resp.bytes()?.to_vec())
    }
}

fn expect_status(url: &str, got: StatusCode, want: StatusCode) -> Result<(), ApiError> {
    if got == want {
        Ok(())
    } else {
        Err(ApiError::Status {
            status: got,
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.url("/photos/"), "http://localhost:8000/photos/");

        let bare = ApiClient::new("http://localhost:8000").unwrap();
        assert_eq!(bare.url("/photos/"), "http://localhost:8000/photos/");
    }

    #[test]
    fn test_expect_status() {
        assert!(expect_status("http://x/", StatusCode::OK, StatusCode::OK).is_ok());
        let err = expect_status("http://x/", StatusCode::BAD_GATEWAY, StatusCode::OK)
            .expect_err("status mismatch must error");
        match err {
            ApiError::Status { status, url } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(url, "http://x/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
