//! Client-side intake validation. Runs before any store call.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use super::model::{
    CoachingFormat, ContactType, DegreeLevel, MentorForm, MentorIntake, OpportunityType,
    RoleForm, RoleIntake, StudentForm, StudentIntake, parse_enum,
};

/// Maximum length of the free-text student objective, in characters.
pub const OBJECTIVE_MAX_CHARS: usize = 280;

static PROFESSIONAL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://([a-z0-9-]+\.)*linkedin\.com/\S+$").unwrap()
});

/// One field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field-level problems of a form, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn into_result<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(v) if self.is_empty() => Ok(v),
            _ => Err(self),
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &Option<String>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.push(field, "Ce champ est requis");
            None
        }
    }
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn required_enum<T: serde::de::DeserializeOwned>(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &Option<String>,
) -> Option<T> {
    let raw = required_text(errors, field, value)?;
    let parsed = parse_enum(&raw);
    if parsed.is_none() {
        errors.push(field, format!("Valeur non reconnue: {raw}"));
    }
    parsed
}

fn professional_url(
    errors: &mut ValidationErrors,
    value: &Option<String>,
) -> Option<String> {
    let url = required_text(errors, "linkedin_url", value)?;
    if PROFESSIONAL_URL.is_match(&url) {
        Some(url)
    } else {
        errors.push("linkedin_url", "URL LinkedIn invalide");
        None
    }
}

fn enum_selection<T: serde::de::DeserializeOwned + PartialEq>(
    errors: &mut ValidationErrors,
    field: &'static str,
    values: &[String],
) -> Option<Vec<T>> {
    let mut selected = Vec::new();
    for raw in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match parse_enum::<T>(raw) {
            Some(v) if !selected.contains(&v) => selected.push(v),
            Some(_) => {}
            None => {
                errors.push(field, format!("Valeur non reconnue: {raw}"));
                return None;
            }
        }
    }
    if selected.is_empty() {
        errors.push(field, "Sélectionnez au moins une option");
        return None;
    }
    Some(selected)
}

impl StudentForm {
    pub fn validate(&self) -> Result<StudentIntake, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let school = required_text(&mut errors, "school", &self.school);
        let degree_level: Option<DegreeLevel> =
            required_enum(&mut errors, "degree_level", &self.degree_level);
        let field_of_study = required_text(&mut errors, "field_of_study", &self.field_of_study);
        let internship_type: Option<OpportunityType> =
            required_enum(&mut errors, "internship_type", &self.internship_type);
        let internship_duration =
            required_text(&mut errors, "internship_duration", &self.internship_duration);
        let linkedin_url = professional_url(&mut errors, &self.linkedin_url);

        let available_from = match optional_text(&self.available_from) {
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push("available_from", "Date invalide (AAAA-MM-JJ)");
                    None
                }
            },
            None => None,
        };

        let objective = optional_text(&self.objective);
        if let Some(ref text) = objective {
            let len = text.chars().count();
            if len > OBJECTIVE_MAX_CHARS {
                errors.push(
                    "objective",
                    format!("{len} caractères, maximum {OBJECTIVE_MAX_CHARS}"),
                );
            }
        }

        let intake = (|| {
            Some(StudentIntake {
                school: school?,
                degree_level: degree_level?,
                field_of_study: field_of_study?,
                internship_type: internship_type?,
                internship_duration: internship_duration?,
                linkedin_url: linkedin_url?,
                target_city: optional_text(&self.target_city),
                available_from,
                objective,
            })
        })();
        errors.into_result(intake)
    }
}

impl MentorForm {
    pub fn validate(&self) -> Result<MentorIntake, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let company = required_text(&mut errors, "company", &self.company);
        let current_position =
            required_text(&mut errors, "current_position", &self.current_position);

        let experience_years = match self.experience_years {
            None => {
                errors.push("experience_years", "Ce champ est requis");
                None
            }
            Some(years) if years < 0 => {
                errors.push("experience_years", "Doit être positif ou nul");
                None
            }
            Some(years) => match u32::try_from(years) {
                Ok(years) => Some(years),
                Err(_) => {
                    errors.push("experience_years", "Valeur trop grande");
                    None
                }
            },
        };

        let linkedin_url = professional_url(&mut errors, &self.linkedin_url);
        let contact_types: Option<Vec<ContactType>> =
            enum_selection(&mut errors, "contact_types", &self.contact_types);
        let coaching_formats: Option<Vec<CoachingFormat>> =
            enum_selection(&mut errors, "coaching_formats", &self.coaching_formats);

        let monthly_capacity = match self.monthly_capacity {
            None => {
                errors.push("monthly_capacity", "Ce champ est requis");
                None
            }
            Some(n) if n < 1 => {
                errors.push("monthly_capacity", "Doit être au moins 1");
                None
            }
            Some(n) => match u32::try_from(n) {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push("monthly_capacity", "Valeur trop grande");
                    None
                }
            },
        };

        let intake = (|| {
            Some(MentorIntake {
                company: company?,
                current_position: current_position?,
                experience_years: experience_years?,
                linkedin_url: linkedin_url?,
                contact_types: contact_types?,
                coaching_formats: coaching_formats?,
                monthly_capacity: monthly_capacity?,
                bio: optional_text(&self.bio),
                accepting_mentees: self.accepting_mentees.unwrap_or(true),
            })
        })();
        errors.into_result(intake)
    }
}

impl RoleForm {
    pub fn validate(&self) -> Result<RoleIntake, ValidationErrors> {
        match self {
            Self::Student(form) => form.validate().map(RoleIntake::Student),
            Self::Mentor(form) => form.validate().map(RoleIntake::Mentor),
        }
    }
}
