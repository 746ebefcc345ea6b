//! Attendance worker — the only place backend I/O happens.
//!
//! The tick loop enqueues requests and continues immediately; a dedicated
//! OS thread drains the queue in FIFO order, which also guarantees that
//! writes for the same identity apply in tick order. Results come back as
//! [`Event`]s on an unbounded channel polled by the pipeline.

use crate::events::{AttendanceAction, DenialReason, Event};
use crate::toggle::{format_duration, next_action, AttendanceRecord};
use chrono::{DateTime, Utc};
use passage_core::IdentityId;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Blocking interface to the remote attendance store and code verifier.
/// Implementations are only ever called from the worker thread.
pub trait AttendanceBackend: Send {
    /// Latest attendance record for an identity, open or closed.
    fn latest_record(
        &self,
        identity: &IdentityId,
    ) -> Result<Option<AttendanceRecord>, BackendError>;

    /// Create a new open record.
    fn check_in(&self, identity: &IdentityId, at: DateTime<Utc>) -> Result<(), BackendError>;

    /// Close an open record, supplying the formatted visit duration.
    fn check_out(
        &self,
        record: &AttendanceRecord,
        at: DateTime<Utc>,
        duration: &str,
    ) -> Result<(), BackendError>;

    /// Human-readable name for overlays and logs.
    fn display_name(&self, identity: &IdentityId) -> Result<String, BackendError>;

    /// Resolve a fallback (identifier, one-time code) pair. `Ok(None)` is
    /// a rejected code, an expected outcome rather than an error.
    fn verify_code(
        &self,
        identifier: &str,
        code: &str,
    ) -> Result<Option<IdentityId>, BackendError>;
}

enum WorkerRequest {
    Toggle { identity: IdentityId },
    Fallback { identifier: String, code: String },
}

/// Clone-safe handle to the worker thread. Enqueue operations never
/// block; a full queue drops the request with a warning, favoring backend
/// protection over retries.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    /// Enqueue a toggle for a recognized identity. Returns whether the
    /// request was accepted; the caller stamps the cooldown only then.
    pub fn request_toggle(&self, identity: IdentityId) -> bool {
        match self.tx.try_send(WorkerRequest::Toggle { identity }) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "attendance queue full — dropping toggle request");
                false
            }
        }
    }

    /// Enqueue a fallback verification request.
    pub fn submit_fallback(&self, identifier: String, code: String) -> bool {
        match self.tx.try_send(WorkerRequest::Fallback { identifier, code }) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "attendance queue full — dropping fallback request");
                false
            }
        }
    }
}

/// Spawn the worker on a dedicated OS thread. The thread exits when every
/// handle has been dropped; an in-flight request simply never reports,
/// emitting no spurious denial on shutdown.
pub fn spawn_worker(
    backend: impl AttendanceBackend + 'static,
    events: mpsc::UnboundedSender<Event>,
    queue_depth: usize,
) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name("passage-attendance".into())
        .spawn(move || {
            tracing::info!("attendance worker started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    WorkerRequest::Toggle { identity } => {
                        run_toggle(&backend, &events, &identity);
                    }
                    WorkerRequest::Fallback { identifier, code } => {
                        run_fallback(&backend, &events, &identifier, &code);
                    }
                }
            }
            tracing::info!("attendance worker exiting");
        })
        .expect("failed to spawn attendance worker thread");

    WorkerHandle { tx }
}

/// Read the latest record, apply the opposite transition, report the
/// outcome. Backend failures surface as a denial event plus an error log
/// and never crash the worker.
fn run_toggle(
    backend: &impl AttendanceBackend,
    events: &mpsc::UnboundedSender<Event>,
    identity: &IdentityId,
) {
    let now = Utc::now();

    let result = backend.latest_record(identity).and_then(|latest| {
        let action = next_action(latest.as_ref());
        match action {
            AttendanceAction::CheckIn => backend.check_in(identity, now)?,
            AttendanceAction::CheckOut => {
                // next_action only returns CheckOut for an open record.
                let record = latest.as_ref().ok_or_else(|| {
                    BackendError::Rejected("check-out with no open record".to_string())
                })?;
                let duration = format_duration(record.check_in, now);
                backend.check_out(record, now, &duration)?;
            }
        }
        Ok(action)
    });

    match result {
        Ok(action) => {
            let display_name = backend
                .display_name(identity)
                .unwrap_or_else(|_| identity.to_string());
            tracing::info!(%identity, %action, "attendance recorded");
            let _ = events.send(Event::Accepted {
                identity: identity.clone(),
                action,
                timestamp: now,
                display_name,
            });
        }
        Err(err) => {
            tracing::error!(%identity, error = %err, "attendance write failed");
            let _ = events.send(Event::Denied {
                reason: DenialReason::BackendUnavailable,
            });
        }
    }
}

fn run_fallback(
    backend: &impl AttendanceBackend,
    events: &mpsc::UnboundedSender<Event>,
    identifier: &str,
    code: &str,
) {
    match backend.verify_code(identifier, code) {
        Ok(Some(identity)) => {
            tracing::info!(%identity, "fallback code accepted");
            run_toggle(backend, events, &identity);
            let _ = events.send(Event::Resolved {
                identity: Some(identity),
            });
        }
        Ok(None) => {
            tracing::warn!(identifier, "fallback code rejected");
            let _ = events.send(Event::Denied {
                reason: DenialReason::CodeRejected,
            });
            let _ = events.send(Event::Resolved { identity: None });
        }
        Err(err) => {
            tracing::error!(identifier, error = %err, "fallback verification unavailable");
            let _ = events.send(Event::Denied {
                reason: DenialReason::BackendUnavailable,
            });
            let _ = events.send(Event::Resolved { identity: None });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory backend tracking open/closed records per identity.
    struct MemoryBackend {
        records: Mutex<Vec<AttendanceRecord>>,
        fail_writes: bool,
        valid_code: Option<(String, String, IdentityId)>,
    }

    impl MemoryBackend {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail_writes: false,
                valid_code: None,
            }
        }
    }

    impl AttendanceBackend for MemoryBackend {
        fn latest_record(
            &self,
            identity: &IdentityId,
        ) -> Result<Option<AttendanceRecord>, BackendError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| &r.identity == identity)
                .next_back()
                .cloned())
        }

        fn check_in(&self, identity: &IdentityId, at: DateTime<Utc>) -> Result<(), BackendError> {
            if self.fail_writes {
                return Err(BackendError::Unavailable("store down".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let id = records.len().to_string();
            records.push(AttendanceRecord {
                id,
                identity: identity.clone(),
                check_in: at,
                check_out: None,
            });
            Ok(())
        }

        fn check_out(
            &self,
            record: &AttendanceRecord,
            at: DateTime<Utc>,
            _duration: &str,
        ) -> Result<(), BackendError> {
            if self.fail_writes {
                return Err(BackendError::Unavailable("store down".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let stored = records
                .iter_mut()
                .find(|r| r.id == record.id)
                .ok_or_else(|| BackendError::Rejected("no such record".to_string()))?;
            stored.check_out = Some(at);
            Ok(())
        }

        fn display_name(&self, identity: &IdentityId) -> Result<String, BackendError> {
            Ok(format!("Name of {identity}"))
        }

        fn verify_code(
            &self,
            identifier: &str,
            code: &str,
        ) -> Result<Option<IdentityId>, BackendError> {
            match &self.valid_code {
                Some((id, c, identity)) if id == identifier && c == code => {
                    Ok(Some(identity.clone()))
                }
                _ => Ok(None),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_toggle_alternates_in_out_in() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = spawn_worker(MemoryBackend::new(), events_tx, 4);

        let id = IdentityId::from("u1");
        for _ in 0..3 {
            assert!(handle.request_toggle(id.clone()));
        }

        let mut actions = Vec::new();
        for _ in 0..3 {
            match events_rx.recv().await.unwrap() {
                Event::Accepted { action, .. } => actions.push(action),
                other => panic!("expected Accepted, got {other:?}"),
            }
        }
        assert_eq!(
            actions,
            vec![
                AttendanceAction::CheckIn,
                AttendanceAction::CheckOut,
                AttendanceAction::CheckIn
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_failure_reports_backend_unavailable() {
        let backend = MemoryBackend {
            fail_writes: true,
            ..MemoryBackend::new()
        };
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = spawn_worker(backend, events_tx, 4);

        assert!(handle.request_toggle(IdentityId::from("u1")));
        match events_rx.recv().await.unwrap() {
            Event::Denied { reason } => assert_eq!(reason, DenialReason::BackendUnavailable),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fallback_success_toggles_and_resolves() {
        let backend = MemoryBackend {
            valid_code: Some((
                "user@example.com".to_string(),
                "12345678".to_string(),
                IdentityId::from("u7"),
            )),
            ..MemoryBackend::new()
        };
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = spawn_worker(backend, events_tx, 4);

        assert!(handle.submit_fallback("user@example.com".to_string(), "12345678".to_string()));

        match events_rx.recv().await.unwrap() {
            Event::Accepted {
                identity, action, ..
            } => {
                assert_eq!(identity.as_str(), "u7");
                assert_eq!(action, AttendanceAction::CheckIn);
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        match events_rx.recv().await.unwrap() {
            Event::Resolved { identity } => assert_eq!(identity.unwrap().as_str(), "u7"),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fallback_rejection_denies_and_resolves_none() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = spawn_worker(MemoryBackend::new(), events_tx, 4);

        assert!(handle.submit_fallback("nobody@example.com".to_string(), "00000000".to_string()));

        match events_rx.recv().await.unwrap() {
            Event::Denied { reason } => assert_eq!(reason, DenialReason::CodeRejected),
            other => panic!("expected Denied, got {other:?}"),
        }
        match events_rx.recv().await.unwrap() {
            Event::Resolved { identity } => assert!(identity.is_none()),
            other => panic!("expected Resolved, got {other:?}"),
        }
    }
}
