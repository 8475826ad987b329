//! Onboarding orchestrator: turns one validated intake form into an
//! idempotent create-or-update of the participant's profile and role detail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::call::store_call;
use super::model::{MentorDetail, Profile, RoleDetail, RoleForm, RoleIntake, StudentDetail};
use super::roles::Role;
use super::session::ProfileSession;
use super::state::{ProfileEvent, VerificationStatus};
use crate::error::{DatabaseError, OnboardingError};
use crate::store::{Database, ProfileWrite};

/// Where the caller should send the participant after a successful
/// submission. Navigation itself is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingRoute {
    StudentHome,
    MentorHome,
}

impl LandingRoute {
    pub fn path(&self) -> &'static str {
        match self {
            Self::StudentHome => "/student/home",
            Self::MentorHome => "/mentor/home",
        }
    }
}

impl From<Role> for LandingRoute {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => Self::StudentHome,
            Role::Mentor => Self::MentorHome,
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    /// Profile as observed after the cache refresh.
    pub profile: Profile,
    pub role: Role,
    pub landing: LandingRoute,
    /// Whether this submission created the profile.
    pub created: bool,
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-session submission workflow. Together with the initial load, the
/// only writer of the session cache.
pub struct OnboardingOrchestrator {
    db: Arc<dyn Database>,
    session: Arc<ProfileSession>,
    store_timeout: Duration,
    in_flight: AtomicBool,
}

impl OnboardingOrchestrator {
    pub fn new(
        db: Arc<dyn Database>,
        session: Arc<ProfileSession>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            db,
            session,
            store_timeout,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<ProfileSession> {
        &self.session
    }

    /// Whether a submission is outstanding (the form should be disabled).
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submit one role's intake form.
    ///
    /// 1. Validate; nothing reaches the store on failure.
    /// 2. Union the cached role set with the submitted role.
    /// 3. Look up the persisted profile; plan an update (roles merged,
    ///    status back to review) or a create.
    /// 4. Look up the role detail by `(profile, role)`; plan its update or
    ///    creation.
    /// 5. Commit profile and detail together.
    /// 6. Refresh the session cache and report the landing route.
    pub async fn submit(
        &self,
        form: &RoleForm,
        cancel: &CancellationToken,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        let intake = form.validate().map_err(|errors| {
            debug!(role = %form.role(), %errors, "Onboarding form rejected");
            OnboardingError::Validation(errors)
        })?;

        let _flight =
            InFlight::acquire(&self.in_flight).ok_or(OnboardingError::SubmissionInFlight)?;
        let role = intake.role();
        let identity = self.session.identity();
        info!(identity = %identity, role = %role, "Onboarding submission started");

        let merged = self.session.current().role_set().with(role);

        let existing = store_call(
            "get_profile_by_identity",
            self.store_timeout,
            cancel,
            self.db.get_profile_by_identity(identity),
        )
        .await?;

        let (write, existing_detail) = match existing {
            Some(profile) => {
                let status = profile.status.apply(ProfileEvent::Submitted)?;
                let detail = store_call(
                    "get_role_detail",
                    self.store_timeout,
                    cancel,
                    self.db.get_role_detail(profile.id, role),
                )
                .await?;
                let write = ProfileWrite::Update {
                    id: profile.id,
                    role_set: profile.role_set.union(&merged),
                    status,
                };
                (write, detail)
            }
            None => {
                let status = VerificationStatus::None.apply(ProfileEvent::Submitted)?;
                let mut profile = Profile::new(identity.clone(), role);
                profile.status = status;
                (ProfileWrite::Create(profile), None)
            }
        };
        let created = matches!(write, ProfileWrite::Create(_));
        let profile_id = write.profile_id();
        let detail = plan_detail(profile_id, intake, existing_detail);

        store_call(
            "apply_onboarding",
            self.store_timeout,
            cancel,
            self.db.apply_onboarding(&write, &detail),
        )
        .await
        .map_err(|e| match e {
            OnboardingError::Store(DatabaseError::Partial { profile_id, reason }) => {
                OnboardingError::InconsistentState { profile_id, reason }
            }
            other => other,
        })?;

        let entry = self.session.refresh(cancel).await?;
        let profile = entry.profile.clone().ok_or_else(|| {
            warn!(profile_id = %profile_id, "Profile missing right after onboarding write");
            OnboardingError::InconsistentState {
                profile_id,
                reason: "profile not found after onboarding write".into(),
            }
        })?;

        info!(
            identity = %identity,
            role = %role,
            profile_id = %profile.id,
            roles = %profile.role_set,
            created,
            "Onboarding submission complete"
        );

        Ok(SubmissionOutcome {
            profile,
            role,
            landing: LandingRoute::from(role),
            created,
        })
    }
}

/// New detail for a first submission, or the existing one with the intake
/// applied on top.
fn plan_detail(
    profile_id: uuid::Uuid,
    intake: RoleIntake,
    existing: Option<RoleDetail>,
) -> RoleDetail {
    match (intake, existing) {
        (RoleIntake::Student(intake), Some(RoleDetail::Student(mut detail))) => {
            detail.apply_intake(intake);
            RoleDetail::Student(detail)
        }
        (RoleIntake::Student(intake), _) => {
            RoleDetail::Student(StudentDetail::from_intake(profile_id, intake))
        }
        (RoleIntake::Mentor(intake), Some(RoleDetail::Mentor(mut detail))) => {
            detail.apply_intake(intake);
            RoleDetail::Mentor(detail)
        }
        (RoleIntake::Mentor(intake), _) => {
            RoleDetail::Mentor(MentorDetail::from_intake(profile_id, intake))
        }
    }
}
