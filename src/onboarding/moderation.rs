//! Moderation decisions arriving from the external review process.
//!
//! Nothing in this crate decides; this only records a decision made
//! elsewhere, after checking it is a legal move for the profile.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::model::{ParticipantId, Profile};
use super::state::ProfileEvent;
use crate::error::{DatabaseError, OnboardingError};
use crate::store::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approved,
    Rejected,
}

impl From<ModerationDecision> for ProfileEvent {
    fn from(decision: ModerationDecision) -> Self {
        match decision {
            ModerationDecision::Approved => ProfileEvent::Approved,
            ModerationDecision::Rejected => ProfileEvent::Rejected,
        }
    }
}

/// Apply a moderation decision to the identity's profile.
///
/// Only a profile under review can be decided; anything else is a
/// [`OnboardingError::Transition`] and the store is left alone.
pub async fn record_moderation(
    db: &dyn Database,
    identity: &ParticipantId,
    decision: ModerationDecision,
) -> Result<Profile, OnboardingError> {
    let mut profile = db
        .get_profile_by_identity(identity)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "profile".into(),
            id: identity.to_string(),
        })?;

    let status = profile.status.apply(decision.into())?;
    db.set_profile_status(profile.id, status).await?;
    info!(identity = %identity, profile_id = %profile.id, %status, "Moderation decision recorded");

    profile.status = status;
    Ok(profile)
}
