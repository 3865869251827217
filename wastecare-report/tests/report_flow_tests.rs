//! Reporting flow from draft to stored record

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use wastecare_common::backend::{
    AuthService, BackendError, BackendResult, PersistenceService, SqliteBackend,
};
use wastecare_common::events::{EventBus, WasteCareEvent};
use wastecare_common::models::{
    CreatedRecord, ReportPayload, RevalidationPayload, RevalidationStatus, SignUpData,
};
use wastecare_common::{ExperienceAwarder, GeoPoint};
use wastecare_report::{
    FinalizeOutcome, ReportDraft, ReportSession, RevalidationDraft, UploadFailure,
    UploadOrchestrator, UploadOutcome, UploadStatus,
};

// ============================================================================
// Helpers
// ============================================================================

fn orchestrator_for(
    backend: Arc<dyn PersistenceService>,
    user_id: &str,
) -> (UploadOrchestrator, EventBus) {
    let bus = EventBus::new(64);
    let awarder = ExperienceAwarder::new(backend.clone()).with_events(bus.clone());
    (
        UploadOrchestrator::new(backend, awarder, bus.clone(), user_id),
        bus,
    )
}

async fn sqlite_with_user() -> (Arc<SqliteBackend>, String) {
    let backend = Arc::new(SqliteBackend::in_memory().await.unwrap());
    let user = backend
        .sign_up(&SignUpData {
            email: "sari@example.com".to_string(),
            password: "rahasia123".to_string(),
            full_name: "Sari".to_string(),
        })
        .await
        .unwrap();
    (backend, user.id)
}

fn jakarta() -> GeoPoint {
    GeoPoint::new(-6.2, 106.8).unwrap()
}

fn complete_draft() -> ReportDraft {
    ReportDraft {
        location: Some(jakarta()),
        photos: vec!["<img>".to_string()],
        ..ReportDraft::default()
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<WasteCareEvent>) -> Vec<WasteCareEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Backend answering every call with the same error
struct FailingBackend {
    error: BackendError,
    calls: AtomicUsize,
    awards: AtomicUsize,
}

impl FailingBackend {
    fn new(error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            error,
            calls: AtomicUsize::new(0),
            awards: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PersistenceService for FailingBackend {
    async fn create_report(&self, _payload: &ReportPayload) -> BackendResult<CreatedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn create_revalidation(
        &self,
        _payload: &RevalidationPayload,
    ) -> BackendResult<CreatedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn rpc(&self, _name: &str, _args: Value) -> BackendResult<Value> {
        self.awards.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

/// Backend whose first `create_report` blocks until released
#[derive(Default)]
struct GatedBackend {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
    awards: AtomicUsize,
}

#[async_trait]
impl PersistenceService for GatedBackend {
    async fn create_report(&self, _payload: &ReportPayload) -> BackendResult<CreatedRecord> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(CreatedRecord {
            id: format!("report-{}", n),
        })
    }

    async fn create_revalidation(
        &self,
        _payload: &RevalidationPayload,
    ) -> BackendResult<CreatedRecord> {
        Ok(CreatedRecord {
            id: "revalidation".to_string(),
        })
    }

    async fn rpc(&self, _name: &str, _args: Value) -> BackendResult<Value> {
        self.awards.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

// ============================================================================
// Successful submission
// ============================================================================

#[tokio::test]
async fn test_finalize_stores_report_awards_once_and_resets_draft() {
    let (backend, user_id) = sqlite_with_user().await;
    let (orchestrator, bus) = orchestrator_for(backend.clone(), &user_id);
    let mut events = bus.subscribe();
    let mut session = ReportSession::new(orchestrator);

    session.store_mut().set_location(jakarta());
    session.store_mut().add_photo("<img>".to_string());

    let outcome = session.finalize().await;
    match outcome {
        FinalizeOutcome::Submitted(UploadOutcome::Succeeded { points_awarded, .. }) => {
            assert_eq!(points_awarded, Some(100));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(session.store().snapshot(), ReportDraft::default());
    let state = session.orchestrator().state().await;
    assert_eq!(state.status, UploadStatus::Success);
    assert_eq!(state.progress, 100);
    assert_eq!(backend.user_exp(&user_id).await.unwrap(), 100);

    let events = drain(&mut events);
    let awarded = events
        .iter()
        .filter(|e| matches!(e, WasteCareEvent::ExperienceAwarded { points: 100, .. }))
        .count();
    assert_eq!(awarded, 1);
    let progress: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            WasteCareEvent::UploadProgress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![0, 25, 90, 100]);
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type() == "UploadSucceeded")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_finalize_redirects_without_network() {
    let backend = FailingBackend::new(BackendError::Transport("unused".into()));
    let (orchestrator, _bus) = orchestrator_for(backend.clone(), "user-1");
    let mut session = ReportSession::new(orchestrator);

    session.store_mut().add_photo("<img>".to_string());
    match session.finalize().await {
        FinalizeOutcome::Redirect(err) => assert_eq!(err.redirect_target, "/lapor"),
        other => panic!("unexpected outcome {:?}", other),
    }

    session.store_mut().remove_photo(0);
    session.store_mut().set_location(jakarta());
    match session.finalize().await {
        FinalizeOutcome::Redirect(err) => {
            assert_eq!(err.redirect_target, "/lapor/konfirmasi-foto")
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        session.orchestrator().state().await.status,
        UploadStatus::Idle
    );
}

#[tokio::test]
async fn test_captured_photo_is_normalised_into_draft() {
    let (backend, user_id) = sqlite_with_user().await;
    let (orchestrator, _bus) = orchestrator_for(backend, &user_id);
    let mut session = ReportSession::new(orchestrator);

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2000, 1000, Rgb([90, 140, 60])));
    let mut raw = Cursor::new(Vec::new());
    image.write_to(&mut raw, ImageFormat::Png).unwrap();

    assert_eq!(session.capture_photo(raw.into_inner()).await.unwrap(), 1);
    let photo = &session.store().draft().photos[0];
    let reloaded = wastecare_report::image_normalizer::load_normalized(photo).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (1024, 512));

    assert!(session.capture_photo(b"not a photo".to_vec()).await.is_err());
    assert_eq!(session.store().draft().photos.len(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_transport_failure_keeps_draft_and_skips_award() {
    let backend = FailingBackend::new(BackendError::Transport("connection refused".into()));
    let (orchestrator, bus) = orchestrator_for(backend.clone(), "user-1");
    let mut events = bus.subscribe();
    let mut session = ReportSession::new(orchestrator);
    session.store_mut().set_location(jakarta());
    session.store_mut().add_photo("<img>".to_string());
    let before = session.store().snapshot();

    let outcome = session.finalize().await;
    assert!(matches!(
        outcome,
        FinalizeOutcome::Submitted(UploadOutcome::Failed {
            failure: UploadFailure::Transient { .. },
            ..
        })
    ));
    assert_eq!(session.store().snapshot(), before);

    let state = session.orchestrator().state().await;
    assert_eq!(state.status, UploadStatus::Failed);
    assert!(state.last_error.as_deref().is_some_and(|m| !m.is_empty()));
    assert_eq!(backend.awards.load(Ordering::SeqCst), 0);

    let failed: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            WasteCareEvent::UploadFailed { retryable, .. } => Some(retryable),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![true]);
}

#[tokio::test]
async fn test_rejection_reports_server_reason() {
    let backend = FailingBackend::new(BackendError::Service {
        status: 422,
        message: Some("photos must not be empty".into()),
    });
    let (orchestrator, _bus) = orchestrator_for(backend.clone(), "user-1");

    let outcome = orchestrator.submit(&complete_draft()).await;
    match outcome {
        UploadOutcome::Failed { failure, .. } => {
            assert!(matches!(failure, UploadFailure::Rejected { status: 422, .. }));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let last_error = orchestrator.state().await.last_error.unwrap();
    assert!(last_error.contains("photos must not be empty"));
    assert_eq!(backend.awards.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_automatic_retry() {
    let backend = FailingBackend::new(BackendError::Service {
        status: 503,
        message: None,
    });
    let (orchestrator, _bus) = orchestrator_for(backend.clone(), "user-1");

    orchestrator.submit(&complete_draft()).await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Stale attempts
// ============================================================================

#[tokio::test]
async fn test_newer_attempt_supersedes_in_flight_one() {
    let backend = Arc::new(GatedBackend::default());
    let (orchestrator, bus) = orchestrator_for(backend.clone(), "user-1");
    let mut events = bus.subscribe();

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.submit(&complete_draft()).await }
    });
    backend.entered.notified().await;

    let second = orchestrator.submit(&complete_draft()).await;
    assert!(matches!(second, UploadOutcome::Succeeded { .. }));

    backend.release.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, UploadOutcome::Superseded { .. }));

    let state = orchestrator.state().await;
    assert_eq!(state.status, UploadStatus::Success);
    assert_eq!(state.attempt_id, Some(second.attempt_id()));
    assert_eq!(backend.awards.load(Ordering::SeqCst), 1);

    let succeeded = drain(&mut events)
        .into_iter()
        .filter(|e| e.event_type() == "UploadSucceeded")
        .count();
    assert_eq!(succeeded, 1);
}

#[tokio::test]
async fn test_abandoned_attempt_result_is_discarded() {
    let backend = Arc::new(GatedBackend::default());
    let (orchestrator, _bus) = orchestrator_for(backend.clone(), "user-1");

    let pending = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.submit(&complete_draft()).await }
    });
    backend.entered.notified().await;
    assert_eq!(orchestrator.state().await.status, UploadStatus::Uploading);

    orchestrator.abandon().await;
    backend.release.notify_one();

    assert!(matches!(
        pending.await.unwrap(),
        UploadOutcome::Superseded { .. }
    ));
    assert_eq!(orchestrator.state().await.status, UploadStatus::Idle);
    assert_eq!(backend.awards.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Revalidation
// ============================================================================

#[tokio::test]
async fn test_revalidation_succeeds_without_experience() {
    let (backend, user_id) = sqlite_with_user().await;
    let (orchestrator, _bus) = orchestrator_for(backend.clone(), &user_id);

    let report_id = match orchestrator.submit(&complete_draft()).await {
        UploadOutcome::Succeeded { record_id, .. } => record_id,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(backend.user_exp(&user_id).await.unwrap(), 100);

    let outcome = orchestrator
        .submit_revalidation(&RevalidationDraft::new(report_id, RevalidationStatus::Clean))
        .await;
    assert!(matches!(
        outcome,
        UploadOutcome::Succeeded {
            points_awarded: None,
            ..
        }
    ));
    assert_eq!(backend.user_exp(&user_id).await.unwrap(), 100);
}

#[tokio::test]
async fn test_revalidation_shares_failure_shape() {
    let (backend, user_id) = sqlite_with_user().await;
    let (orchestrator, _bus) = orchestrator_for(backend, &user_id);

    let outcome = orchestrator
        .submit_revalidation(&RevalidationDraft::new(
            "no-such-report",
            RevalidationStatus::StillDirty,
        ))
        .await;
    assert!(matches!(
        outcome,
        UploadOutcome::Failed {
            failure: UploadFailure::Rejected { status: 404, .. },
            ..
        }
    ));
    let state = orchestrator.state().await;
    assert_eq!(state.status, UploadStatus::Failed);
    assert!(state.last_error.is_some());
}
