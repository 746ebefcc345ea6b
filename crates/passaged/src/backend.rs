//! Adapts the REST client to the attendance worker's backend trait and
//! loads the enrollment gallery at startup.
//!
//! Identities are backend user ids carried as strings through the
//! pipeline; this is the one place they are parsed back to integers.

use passage_api::{ApiClient, ApiError};
use passage_core::{EnrollmentSample, FaceAnalyzer, Gallery, IdentityId, SamplePayload};
use passage_pipeline::{AttendanceBackend, AttendanceRecord, BackendError};
use chrono::{DateTime, Utc};

pub struct ApiBackend {
    client: ApiClient,
}

impl ApiBackend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn user_id_of(identity: &IdentityId) -> Result<i64, BackendError> {
    identity
        .as_str()
        .parse()
        .map_err(|_| BackendError::Rejected(format!("non-numeric identity: {identity}")))
}

impl From<ApiError> for BackendError {
    fn from(err: ApiError) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

impl AttendanceBackend for ApiBackend {
    fn latest_record(
        &self,
        identity: &IdentityId,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        let user_id = user_id_of(identity)?;
        let rows = self.client.attendance_for(user_id)?;
        Ok(rows.into_iter().next_back().map(|row| AttendanceRecord {
            id: row.attendance_id.to_string(),
            identity: identity.clone(),
            check_in: row.check_in,
            check_out: row.check_out,
        }))
    }

    fn check_in(&self, identity: &IdentityId, at: DateTime<Utc>) -> Result<(), BackendError> {
        let user_id = user_id_of(identity)?;
        self.client.create_check_in(user_id, at)?;
        self.audit(user_id, "checked in");
        Ok(())
    }

    fn check_out(
        &self,
        record: &AttendanceRecord,
        at: DateTime<Utc>,
        duration: &str,
    ) -> Result<(), BackendError> {
        let user_id = user_id_of(&record.identity)?;
        let attendance_id: i64 = record
            .id
            .parse()
            .map_err(|_| BackendError::Rejected(format!("non-numeric record id: {}", record.id)))?;
        self.client.patch_check_out(attendance_id, at, duration)?;
        self.audit(user_id, "checked out");
        Ok(())
    }

    fn display_name(&self, identity: &IdentityId) -> Result<String, BackendError> {
        let user_id = user_id_of(identity)?;
        Ok(self.client.user(user_id)?.full_name())
    }

    fn verify_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> Result<Option<IdentityId>, BackendError> {
        let user_id = self.client.verify_otp(identifier, code)?;
        Ok(user_id.map(|id| IdentityId::new(id.to_string())))
    }
}

impl ApiBackend {
    /// Append to the backend audit log, best effort.
    fn audit(&self, user_id: i64, verb: &str) {
        let action = match self.client.user(user_id) {
            Ok(user) => format!("{} ({}) {verb}.", user.full_name(), user.email),
            Err(_) => format!("user {user_id} {verb}."),
        };
        if let Err(err) = self.client.post_log(user_id, &action) {
            tracing::warn!(user_id, error = %err, "audit log write failed");
        }
    }
}

/// Fetch enrollment photos and build the gallery. Prefers server-side
/// aggregated encodings; falls back to downloading photos and encoding
/// locally.
pub fn load_gallery(
    client: &ApiClient,
    analyzer: &mut dyn FaceAnalyzer,
) -> Result<Gallery, anyhow::Error> {
    match client.aggregated_encodings() {
        Ok(records) if !records.is_empty() => {
            let samples = records
                .into_iter()
                .flat_map(|record| {
                    let identity = IdentityId::new(record.user_id.to_string());
                    record.encodings.into_iter().map(move |values| {
                        EnrollmentSample {
                            identity: identity.clone(),
                            payload: SamplePayload::Encoded(values),
                        }
                    })
                })
                .collect::<Vec<_>>();
            tracing::info!(samples = samples.len(), "using server-side encodings");
            Ok(Gallery::build(samples, analyzer)?)
        }
        Ok(_) | Err(_) => {
            tracing::info!("server-side encodings unavailable, encoding photos locally");
            let photos = client.user_photos()?;
            let mut samples = Vec::with_capacity(photos.len());
            for photo in photos {
                let identity = IdentityId::new(photo.user_id.to_string());
                match client.fetch_image(&photo.photo_path) {
                    Ok(bytes) => samples.push(EnrollmentSample {
                        identity,
                        payload: SamplePayload::Photo(bytes),
                    }),
                    Err(err) => {
                        tracing::warn!(%identity, url = photo.photo_path, error = %err,
                            "skipping unfetchable enrollment photo");
                    }
                }
            }
            Ok(Gallery::build(samples, analyzer)?)
        }
    }
}
