//! End-to-end onboarding flows against an in-memory libSQL store, with
//! store doubles for counting, failing and stalling calls.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mentorship_onboarding::error::{DatabaseError, OnboardingError};
use mentorship_onboarding::onboarding::{
    LandingRoute, MentorDetail, MentorForm, ModerationDecision, OnboardingOrchestrator,
    ParticipantId, Profile, ProfileSession, Role, RoleDetail, RoleForm, RoleSet, StudentDetail,
    StudentForm, VerificationStatus, record_moderation,
};
use mentorship_onboarding::store::{Database, LibSqlBackend, ProfileWrite};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Delegates to libSQL, counting calls. Can fail the onboarding write with
/// a given message, or hold profile lookups until released.
struct RecordingStore {
    inner: LibSqlBackend,
    calls: AtomicUsize,
    fail_apply: Mutex<Option<String>>,
    hold_lookups: AtomicBool,
    gate: Semaphore,
}

impl RecordingStore {
    async fn new() -> Self {
        Self {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            calls: AtomicUsize::new(0),
            fail_apply: Mutex::new(None),
            hold_lookups: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for RecordingStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.init_schema().await
    }

    async fn get_profile_by_identity(
        &self,
        identity: &ParticipantId,
    ) -> Result<Option<Profile>, DatabaseError> {
        self.hit();
        if self.hold_lookups.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|e| DatabaseError::Pool(e.to_string()))?
                .forget();
        }
        self.inner.get_profile_by_identity(identity).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.insert_profile(profile).await
    }

    async fn update_profile_roles(
        &self,
        id: Uuid,
        role_set: &RoleSet,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.update_profile_roles(id, role_set, status).await
    }

    async fn set_profile_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.set_profile_status(id, status).await
    }

    async fn get_student_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<StudentDetail>, DatabaseError> {
        self.hit();
        self.inner.get_student_detail(profile_id).await
    }

    async fn get_mentor_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<MentorDetail>, DatabaseError> {
        self.hit();
        self.inner.get_mentor_detail(profile_id).await
    }

    async fn upsert_student_detail(&self, detail: &StudentDetail) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.upsert_student_detail(detail).await
    }

    async fn upsert_mentor_detail(&self, detail: &MentorDetail) -> Result<(), DatabaseError> {
        self.hit();
        self.inner.upsert_mentor_detail(detail).await
    }

    async fn apply_onboarding(
        &self,
        profile: &ProfileWrite,
        detail: &RoleDetail,
    ) -> Result<(), DatabaseError> {
        self.hit();
        let failure = self.fail_apply.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(DatabaseError::Query(message));
        }
        self.inner.apply_onboarding(profile, detail).await
    }
}

/// No transactional override: profile and detail land in two separate
/// writes, and detail writes always fail.
struct SequentialStore {
    inner: LibSqlBackend,
}

#[async_trait]
impl Database for SequentialStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.inner.init_schema().await
    }

    async fn get_profile_by_identity(
        &self,
        identity: &ParticipantId,
    ) -> Result<Option<Profile>, DatabaseError> {
        self.inner.get_profile_by_identity(identity).await
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        self.inner.insert_profile(profile).await
    }

    async fn update_profile_roles(
        &self,
        id: Uuid,
        role_set: &RoleSet,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        self.inner.update_profile_roles(id, role_set, status).await
    }

    async fn set_profile_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        self.inner.set_profile_status(id, status).await
    }

    async fn get_student_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<StudentDetail>, DatabaseError> {
        self.inner.get_student_detail(profile_id).await
    }

    async fn get_mentor_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<MentorDetail>, DatabaseError> {
        self.inner.get_mentor_detail(profile_id).await
    }

    async fn upsert_student_detail(&self, _detail: &StudentDetail) -> Result<(), DatabaseError> {
        Err(DatabaseError::Query("student_details is read-only".into()))
    }

    async fn upsert_mentor_detail(&self, _detail: &MentorDetail) -> Result<(), DatabaseError> {
        Err(DatabaseError::Query("mentor_details is read-only".into()))
    }
}

fn orchestrator_for(
    db: Arc<dyn Database>,
    identity: &str,
    timeout: Duration,
) -> OnboardingOrchestrator {
    let session = Arc::new(ProfileSession::new(
        ParticipantId::new(identity),
        Arc::clone(&db),
        timeout,
    ));
    OnboardingOrchestrator::new(db, session, timeout)
}

fn u1_student_form() -> RoleForm {
    RoleForm::Student(StudentForm {
        school: Some("HEC Paris".into()),
        degree_level: Some("M1".into()),
        field_of_study: Some("Finance".into()),
        internship_type: Some("Stage Obligatoire".into()),
        internship_duration: Some("6 mois".into()),
        linkedin_url: Some("https://linkedin.com/in/u1".into()),
        ..Default::default()
    })
}

fn mentor_form(company: &str, capacity: i64) -> RoleForm {
    RoleForm::Mentor(MentorForm {
        company: Some(company.into()),
        current_position: Some("Directeur financier".into()),
        experience_years: Some(12),
        linkedin_url: Some("https://www.linkedin.com/in/mentor".into()),
        contact_types: vec!["email".into(), "video_call".into()],
        coaching_formats: vec!["one_on_one".into()],
        monthly_capacity: Some(capacity),
        ..Default::default()
    })
}

#[tokio::test]
async fn first_student_submission_creates_profile_under_review() {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);

    let outcome = orchestrator
        .submit(&u1_student_form(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.landing, LandingRoute::StudentHome);
    assert_eq!(outcome.landing.path(), "/student/home");
    assert!(outcome.created);

    let profile = db
        .get_profile_by_identity(&ParticipantId::new("u1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.role_set, RoleSet::single(Role::Student));
    assert_eq!(profile.status, VerificationStatus::UnderReview);

    let detail = db.get_student_detail(profile.id).await.unwrap().unwrap();
    assert_eq!(detail.school, "HEC Paris");
    assert_eq!(detail.field_of_study, "Finance");
    assert_eq!(detail.internship_duration, "6 mois");
    assert!(detail.target_countries.is_empty());
    assert!(detail.target_sectors.is_empty());
    assert!(detail.languages.is_empty());
    assert!(detail.proof_documents.is_empty());

    let entry = orchestrator.session().current();
    assert_eq!(entry.profile.as_ref(), Some(&profile));
    assert!(!entry.requires_onboarding(Role::Student));
}

#[tokio::test]
async fn mentor_submission_adds_second_role() {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);
    let cancel = CancellationToken::new();

    orchestrator.submit(&u1_student_form(), &cancel).await.unwrap();
    let outcome = orchestrator.submit(&mentor_form("Acme", 3), &cancel).await.unwrap();

    assert_eq!(outcome.landing.path(), "/mentor/home");
    let expected = RoleSet::single(Role::Student).with(Role::Mentor);
    assert_eq!(outcome.profile.role_set, expected);
    assert_eq!(outcome.profile.status, VerificationStatus::UnderReview);

    let entry = orchestrator.session().current();
    assert!(entry.has_role(Role::Student));
    assert!(entry.has_role(Role::Mentor));
    assert_eq!(entry.onboarded_roles(), expected);
}

#[tokio::test]
async fn cold_cache_still_keeps_stored_role() {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let stored = Profile::new(ParticipantId::new("u1"), Role::Student);
    db.insert_profile(&stored).await.unwrap();

    // Session never loaded: the cache knows of no profile at all.
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);
    assert!(orchestrator.session().current().profile.is_none());

    let outcome = orchestrator
        .submit(&mentor_form("Acme", 2), &CancellationToken::new())
        .await
        .unwrap();

    let expected = RoleSet::single(Role::Student).with(Role::Mentor);
    assert!(!outcome.created);
    assert_eq!(outcome.profile.id, stored.id);
    assert_eq!(outcome.profile.role_set, expected);
    let persisted = db
        .get_profile_by_identity(&ParticipantId::new("u1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.role_set, expected);
}

#[tokio::test]
async fn resubmission_restarts_review_after_any_decision() {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let identity = ParticipantId::new("u1");
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);
    let cancel = CancellationToken::new();

    for decision in [ModerationDecision::Approved, ModerationDecision::Rejected] {
        orchestrator.submit(&u1_student_form(), &cancel).await.unwrap();
        let decided = record_moderation(db.as_ref(), &identity, decision)
            .await
            .unwrap();
        assert!(decided.status.is_decided());

        let outcome = orchestrator.submit(&mentor_form("Acme", 2), &cancel).await.unwrap();
        assert_eq!(outcome.profile.status, VerificationStatus::UnderReview);
        assert_eq!(orchestrator.session().current().status(), VerificationStatus::UnderReview);
    }
}

#[tokio::test]
async fn mentor_resubmission_keeps_one_detail_row() {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);
    let cancel = CancellationToken::new();

    let first = orchestrator.submit(&mentor_form("Acme", 2), &cancel).await.unwrap();
    let first_detail = db.get_mentor_detail(first.profile.id).await.unwrap().unwrap();

    let second = orchestrator.submit(&mentor_form("Globex", 5), &cancel).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.profile.id, first.profile.id);

    let detail = db.get_mentor_detail(first.profile.id).await.unwrap().unwrap();
    assert_eq!(detail.id, first_detail.id);
    assert_eq!(detail.company, "Globex");
    assert_eq!(detail.monthly_capacity, 5);
    assert_eq!(second.profile.role_set, RoleSet::single(Role::Mentor));
}

#[tokio::test]
async fn invalid_form_never_reaches_the_store() {
    let store = Arc::new(RecordingStore::new().await);
    let db: Arc<dyn Database> = store.clone();
    let orchestrator = orchestrator_for(db, "u1", TIMEOUT);

    let form = RoleForm::Student(StudentForm {
        school: Some("HEC Paris".into()),
        linkedin_url: Some("not a url".into()),
        ..Default::default()
    });
    let err = orchestrator
        .submit(&form, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        OnboardingError::Validation(errors) => {
            assert!(errors.has("degree_level"));
            assert!(errors.has("linkedin_url"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let form = RoleForm::Mentor(MentorForm {
        current_position: Some("CFO".into()),
        experience_years: Some(-1),
        linkedin_url: Some("https://linkedin.com/in/m".into()),
        contact_types: vec!["email".into()],
        coaching_formats: vec!["group".into()],
        monthly_capacity: Some(1),
        ..Default::default()
    });
    let err = orchestrator
        .submit(&form, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        OnboardingError::Validation(errors) => {
            assert!(errors.has("company"));
            assert!(errors.has("experience_years"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn store_failure_keeps_cache_and_surfaces_store_text() {
    let store = Arc::new(RecordingStore::new().await);
    let db: Arc<dyn Database> = store.clone();
    let orchestrator = orchestrator_for(db, "u1", TIMEOUT);
    let cancel = CancellationToken::new();

    orchestrator.submit(&u1_student_form(), &cancel).await.unwrap();
    let before = orchestrator.session().current();

    let message = "permission denied for table mentor_details";
    *store.fail_apply.lock().unwrap() = Some(message.to_string());
    let err = orchestrator
        .submit(&mentor_form("Acme", 2), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), message);
    assert!(Arc::ptr_eq(&before, &orchestrator.session().current()));
    assert!(!orchestrator.session().current().has_role(Role::Mentor));
    assert!(!orchestrator.is_submitting());
}

#[tokio::test]
async fn partial_write_is_reported_as_inconsistent() {
    let store = SequentialStore {
        inner: LibSqlBackend::new_memory().await.unwrap(),
    };
    let db: Arc<dyn Database> = Arc::new(store);
    let orchestrator = orchestrator_for(Arc::clone(&db), "u1", TIMEOUT);

    let err = orchestrator
        .submit(&u1_student_form(), &CancellationToken::new())
        .await
        .unwrap_err();

    let profile = db
        .get_profile_by_identity(&ParticipantId::new("u1"))
        .await
        .unwrap()
        .expect("profile write landed");
    match err {
        OnboardingError::InconsistentState { profile_id, reason } => {
            assert_eq!(profile_id, profile.id);
            assert!(reason.contains("student_details is read-only"));
        }
        other => panic!("expected inconsistent state, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_submission_fails_fast() {
    let store = Arc::new(RecordingStore::new().await);
    store.hold_lookups.store(true, Ordering::SeqCst);
    let db: Arc<dyn Database> = store.clone();
    let orchestrator = Arc::new(orchestrator_for(db, "u1", TIMEOUT));

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .submit(&u1_student_form(), &CancellationToken::new())
                .await
        })
    };
    while !orchestrator.is_submitting() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let err = orchestrator
        .submit(&mentor_form("Acme", 2), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::SubmissionInFlight));

    store.hold_lookups.store(false, Ordering::SeqCst);
    store.gate.add_permits(1);
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.role, Role::Student);
    assert!(!orchestrator.is_submitting());
}

#[tokio::test]
async fn stalled_store_times_out() {
    let store = Arc::new(RecordingStore::new().await);
    store.hold_lookups.store(true, Ordering::SeqCst);
    let db: Arc<dyn Database> = store.clone();
    let orchestrator = orchestrator_for(db, "u1", Duration::from_millis(50));

    let err = orchestrator
        .submit(&u1_student_form(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OnboardingError::Timeout {
            operation: "get_profile_by_identity",
            ..
        }
    ));
    assert!(!orchestrator.is_submitting());
}
