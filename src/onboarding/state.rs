//! Verification state machine: the moderation state a profile passes through.

use serde::{Deserialize, Serialize};

/// Moderation state of a profile.
///
/// `None` → `UnderReview` → `Verified` | `Rejected`. Every onboarding
/// submission sends the profile back to `UnderReview`, whatever it was
/// before. Only the external moderation process moves a profile out of
/// `UnderReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No profile row exists yet.
    #[default]
    None,
    UnderReview,
    Verified,
    Rejected,
}

/// Something that happened to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    /// An onboarding form was submitted (first time or again).
    Submitted,
    /// Moderation accepted the profile.
    Approved,
    /// Moderation refused the profile.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot apply {event:?} to a profile in state {from}")]
pub struct TransitionError {
    pub from: VerificationStatus,
    pub event: ProfileEvent,
}

impl VerificationStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, target),
            (_, UnderReview) | (UnderReview, Verified) | (UnderReview, Rejected)
        )
    }

    /// State reached after `event`.
    pub fn apply(self, event: ProfileEvent) -> Result<VerificationStatus, TransitionError> {
        let target = match event {
            ProfileEvent::Submitted => VerificationStatus::UnderReview,
            ProfileEvent::Approved => VerificationStatus::Verified,
            ProfileEvent::Rejected => VerificationStatus::Rejected,
        };
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(TransitionError { from: self, event })
        }
    }

    /// Whether a moderation decision has been recorded.
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }

    /// Whether the participant has full access.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Verified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UnderReview => "under_review",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "under_review" => Ok(Self::UnderReview),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Unknown verification status: {other}")),
        }
    }
}
