//! Role & profile lifecycle engine.
//!
//! A participant onboards as a student, a mentor, or both. Each submission
//! is validated, written as one profile + role-detail pair, and sends the
//! profile back to moderation. The session cache holds what the store had
//! at the last refresh and is what every consumer reads.

mod call;
pub mod model;
pub mod moderation;
pub mod orchestrator;
pub mod registry;
pub mod roles;
pub mod routes;
pub mod session;
pub mod state;
pub mod validation;

pub use model::{
    MentorDetail, MentorForm, ParticipantId, Profile, RoleDetail, RoleForm, StudentDetail,
    StudentForm,
};
pub use moderation::{ModerationDecision, record_moderation};
pub use orchestrator::{LandingRoute, OnboardingOrchestrator, SubmissionOutcome};
pub use registry::{ParticipantSession, SessionRegistry};
pub use roles::{Role, RoleSet, has_role};
pub use routes::{OnboardingRouteState, cors_layer, onboarding_routes};
pub use session::{CacheEntry, ProfileSession};
pub use state::{ProfileEvent, VerificationStatus};
pub use validation::{FieldError, ValidationErrors};
