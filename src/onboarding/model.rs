//! Profile, role-detail and intake-form data models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::{Role, RoleSet};
use super::state::VerificationStatus;

/// Opaque reference to an authenticated participant. Owned by the auth
/// provider; never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One profile per authenticated participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub identity: ParticipantId,
    pub role_set: RoleSet,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile created by the first onboarding submission.
    pub fn new(identity: ParticipantId, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity,
            role_set: RoleSet::single(role),
            status: VerificationStatus::UnderReview,
            display_name: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Enumerations collected at intake ────────────────────────────────

/// Current degree level of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegreeLevel {
    #[serde(rename = "Bac")]
    Bac,
    #[serde(rename = "L1")]
    L1,
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "L3")]
    L3,
    #[serde(rename = "M1")]
    M1,
    #[serde(rename = "M2")]
    M2,
    #[serde(rename = "Doctorat")]
    Doctorat,
}

/// Kind of opportunity a student is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityType {
    #[serde(rename = "Stage Obligatoire")]
    StageObligatoire,
    #[serde(rename = "Stage de Césure")]
    StageCesure,
    #[serde(rename = "Alternance")]
    Alternance,
    #[serde(rename = "Premier Emploi")]
    PremierEmploi,
    #[serde(rename = "VIE")]
    Vie,
}

/// How a mentor agrees to be contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    Email,
    Phone,
    VideoCall,
    Messaging,
}

/// Coaching formats a mentor offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachingFormat {
    OneOnOne,
    Group,
    MockInterview,
    ApplicationReview,
}

/// Parse a closed-vocabulary value using its serde name.
pub(crate) fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string())).ok()
}

// ── Intake forms (as submitted) ─────────────────────────────────────

/// Student intake form exactly as the client submitted it.
///
/// Everything is optional here; [`StudentForm::validate`] decides what is
/// missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentForm {
    pub school: Option<String>,
    pub degree_level: Option<String>,
    pub field_of_study: Option<String>,
    pub internship_type: Option<String>,
    pub internship_duration: Option<String>,
    pub linkedin_url: Option<String>,
    pub target_city: Option<String>,
    /// `YYYY-MM-DD`.
    pub available_from: Option<String>,
    pub objective: Option<String>,
}

/// Mentor intake form exactly as the client submitted it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MentorForm {
    pub company: Option<String>,
    pub current_position: Option<String>,
    pub experience_years: Option<i64>,
    pub linkedin_url: Option<String>,
    pub contact_types: Vec<String>,
    pub coaching_formats: Vec<String>,
    pub monthly_capacity: Option<i64>,
    pub bio: Option<String>,
    pub accepting_mentees: Option<bool>,
}

/// One submission, tagged by the role it onboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleForm {
    Student(StudentForm),
    Mentor(MentorForm),
}

impl RoleForm {
    pub fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Mentor(_) => Role::Mentor,
        }
    }
}

// ── Validated intake ────────────────────────────────────────────────

/// Student fields after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentIntake {
    pub school: String,
    pub degree_level: DegreeLevel,
    pub field_of_study: String,
    pub internship_type: OpportunityType,
    pub internship_duration: String,
    pub linkedin_url: String,
    pub target_city: Option<String>,
    pub available_from: Option<NaiveDate>,
    pub objective: Option<String>,
}

/// Mentor fields after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct MentorIntake {
    pub company: String,
    pub current_position: String,
    pub experience_years: u32,
    pub linkedin_url: String,
    pub contact_types: Vec<ContactType>,
    pub coaching_formats: Vec<CoachingFormat>,
    pub monthly_capacity: u32,
    pub bio: Option<String>,
    pub accepting_mentees: bool,
}

/// A validated submission, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleIntake {
    Student(StudentIntake),
    Mentor(MentorIntake),
}

impl RoleIntake {
    pub fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Mentor(_) => Role::Mentor,
        }
    }
}

// ── Role details (persisted) ────────────────────────────────────────

/// Student-specific record, one per profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDetail {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub school: String,
    pub degree_level: DegreeLevel,
    pub field_of_study: String,
    pub internship_type: OpportunityType,
    pub internship_duration: String,
    pub linkedin_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    pub target_countries: Vec<String>,
    pub target_sectors: Vec<String>,
    pub languages: Vec<String>,
    pub proof_documents: Vec<String>,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentDetail {
    /// First submission: later-filled lists start empty.
    pub fn from_intake(profile_id: Uuid, intake: StudentIntake) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile_id,
            school: intake.school,
            degree_level: intake.degree_level,
            field_of_study: intake.field_of_study,
            internship_type: intake.internship_type,
            internship_duration: intake.internship_duration,
            linkedin_url: intake.linkedin_url,
            target_city: intake.target_city,
            available_from: intake.available_from,
            objective: intake.objective,
            target_countries: Vec::new(),
            target_sectors: Vec::new(),
            languages: Vec::new(),
            proof_documents: Vec::new(),
            onboarding_complete: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resubmission: intake fields are replaced, later-filled lists kept.
    pub fn apply_intake(&mut self, intake: StudentIntake) {
        self.school = intake.school;
        self.degree_level = intake.degree_level;
        self.field_of_study = intake.field_of_study;
        self.internship_type = intake.internship_type;
        self.internship_duration = intake.internship_duration;
        self.linkedin_url = intake.linkedin_url;
        self.target_city = intake.target_city;
        self.available_from = intake.available_from;
        self.objective = intake.objective;
        self.onboarding_complete = true;
        self.updated_at = Utc::now();
    }
}

/// Mentor-specific record, one per profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorDetail {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub company: String,
    pub current_position: String,
    pub experience_years: u32,
    pub linkedin_url: String,
    pub contact_types: Vec<ContactType>,
    pub coaching_formats: Vec<CoachingFormat>,
    pub monthly_capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub accepting_mentees: bool,
    pub expertise_sectors: Vec<String>,
    pub target_countries: Vec<String>,
    pub languages: Vec<String>,
    pub proof_documents: Vec<String>,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MentorDetail {
    pub fn from_intake(profile_id: Uuid, intake: MentorIntake) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile_id,
            company: intake.company,
            current_position: intake.current_position,
            experience_years: intake.experience_years,
            linkedin_url: intake.linkedin_url,
            contact_types: intake.contact_types,
            coaching_formats: intake.coaching_formats,
            monthly_capacity: intake.monthly_capacity,
            bio: intake.bio,
            accepting_mentees: intake.accepting_mentees,
            expertise_sectors: Vec::new(),
            target_countries: Vec::new(),
            languages: Vec::new(),
            proof_documents: Vec::new(),
            onboarding_complete: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_intake(&mut self, intake: MentorIntake) {
        self.company = intake.company;
        self.current_position = intake.current_position;
        self.experience_years = intake.experience_years;
        self.linkedin_url = intake.linkedin_url;
        self.contact_types = intake.contact_types;
        self.coaching_formats = intake.coaching_formats;
        self.monthly_capacity = intake.monthly_capacity;
        self.bio = intake.bio;
        self.accepting_mentees = intake.accepting_mentees;
        self.onboarding_complete = true;
        self.updated_at = Utc::now();
    }
}

/// A role detail of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleDetail {
    Student(StudentDetail),
    Mentor(MentorDetail),
}

impl RoleDetail {
    pub fn role(&self) -> Role {
        match self {
            Self::Student(_) => Role::Student,
            Self::Mentor(_) => Role::Mentor,
        }
    }

    pub fn profile_id(&self) -> Uuid {
        match self {
            Self::Student(d) => d.profile_id,
            Self::Mentor(d) => d.profile_id,
        }
    }

    pub fn onboarding_complete(&self) -> bool {
        match self {
            Self::Student(d) => d.onboarding_complete,
            Self::Mentor(d) => d.onboarding_complete,
        }
    }
}
