//! Error types for the onboarding engine.

use std::time::Duration;

use crate::onboarding::state::TransitionError;
use crate::onboarding::validation::ValidationErrors;

/// Generic message shown when a failure carries no store text.
pub const GENERIC_USER_MESSAGE: &str =
    "Une erreur est survenue lors de l'enregistrement. Veuillez réessayer.";

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The profile write landed but the role-detail write did not.
    #[error("Partial write for profile {profile_id}: {reason}")]
    Partial {
        profile_id: uuid::Uuid,
        reason: String,
    },
}

/// Failures of an onboarding submission or a session refresh.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Inconsistent profile state for {profile_id}: {reason}")]
    InconsistentState {
        profile_id: uuid::Uuid,
        reason: String,
    },

    #[error("Store call {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Store call {operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl OnboardingError {
    /// Text for the inline error banner.
    ///
    /// Store failures show the raw store message; everything else without a
    /// field-level explanation falls back to the generic message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => errors.to_string(),
            Self::Store(e) => store_text(e).unwrap_or_else(|| GENERIC_USER_MESSAGE.to_string()),
            Self::InconsistentState { reason, .. } if !reason.is_empty() => reason.clone(),
            _ => GENERIC_USER_MESSAGE.to_string(),
        }
    }

    /// Whether the failure left the store untouched.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

fn store_text(e: &DatabaseError) -> Option<String> {
    let text = match e {
        DatabaseError::Pool(s)
        | DatabaseError::Query(s)
        | DatabaseError::Constraint(s)
        | DatabaseError::Migration(s)
        | DatabaseError::Serialization(s) => s.clone(),
        DatabaseError::Partial { reason, .. } => reason.clone(),
        DatabaseError::NotFound { .. } => e.to_string(),
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_surfaces_raw_text() {
        let err = OnboardingError::Store(DatabaseError::Query(
            "duplicate key value violates unique constraint".into(),
        ));
        assert_eq!(
            err.user_message(),
            "duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn empty_store_text_falls_back_to_generic() {
        let err = OnboardingError::Store(DatabaseError::Query("  ".into()));
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);
    }

    #[test]
    fn timeout_uses_generic_message() {
        let err = OnboardingError::Timeout {
            operation: "insert_profile",
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);
        assert!(!err.is_validation());
    }
}
