//! `Database` trait: the row-level interface the onboarding engine needs
//! from the persistent profile store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{
    MentorDetail, ParticipantId, Profile, RoleDetail, StudentDetail,
};
use crate::onboarding::roles::{Role, RoleSet};
use crate::onboarding::state::VerificationStatus;

/// The profile half of an onboarding write.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileWrite {
    /// No profile existed for the identity.
    Create(Profile),
    /// The profile exists; replace its roles and reset its status.
    Update {
        id: Uuid,
        role_set: RoleSet,
        status: VerificationStatus,
    },
}

impl ProfileWrite {
    pub fn profile_id(&self) -> Uuid {
        match self {
            Self::Create(p) => p.id,
            Self::Update { id, .. } => *id,
        }
    }
}

/// Backend-agnostic profile store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Look up the profile owned by an identity.
    async fn get_profile_by_identity(
        &self,
        identity: &ParticipantId,
    ) -> Result<Option<Profile>, DatabaseError>;

    /// Insert a new profile.
    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError>;

    /// Replace a profile's role set and status.
    async fn update_profile_roles(
        &self,
        id: Uuid,
        role_set: &RoleSet,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError>;

    /// Overwrite a profile's status. Used to record moderation decisions.
    async fn set_profile_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError>;

    // ── Role details ────────────────────────────────────────────────

    async fn get_student_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<StudentDetail>, DatabaseError>;

    async fn get_mentor_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<MentorDetail>, DatabaseError>;

    /// Insert the student detail, or update the one already keyed by
    /// its `profile_id`.
    async fn upsert_student_detail(&self, detail: &StudentDetail) -> Result<(), DatabaseError>;

    /// Insert the mentor detail, or update the one already keyed by
    /// its `profile_id`.
    async fn upsert_mentor_detail(&self, detail: &MentorDetail) -> Result<(), DatabaseError>;

    /// Look up the detail for `(profile_id, role)`.
    async fn get_role_detail(
        &self,
        profile_id: Uuid,
        role: Role,
    ) -> Result<Option<RoleDetail>, DatabaseError> {
        Ok(match role {
            Role::Student => self.get_student_detail(profile_id).await?.map(RoleDetail::Student),
            Role::Mentor => self.get_mentor_detail(profile_id).await?.map(RoleDetail::Mentor),
        })
    }

    /// Write the profile and its role detail.
    ///
    /// The default runs the two writes in sequence; a failure of the second
    /// is reported as [`DatabaseError::Partial`]. Backends with transactions
    /// override this to make the pair atomic.
    async fn apply_onboarding(
        &self,
        profile: &ProfileWrite,
        detail: &RoleDetail,
    ) -> Result<(), DatabaseError> {
        match profile {
            ProfileWrite::Create(p) => self.insert_profile(p).await?,
            ProfileWrite::Update {
                id,
                role_set,
                status,
            } => self.update_profile_roles(*id, role_set, *status).await?,
        }

        let written = match detail {
            RoleDetail::Student(d) => self.upsert_student_detail(d).await,
            RoleDetail::Mentor(d) => self.upsert_mentor_detail(d).await,
        };
        written.map_err(|e| DatabaseError::Partial {
            profile_id: profile.profile_id(),
            reason: e.to_string(),
        })
    }
}
