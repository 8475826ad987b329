//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. The role set is stored as
//! its canonical comma-joined string and list fields as JSON text; both are
//! converted back into domain types here and nowhere else.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{
    MentorDetail, ParticipantId, Profile, RoleDetail, StudentDetail, parse_enum,
};
use crate::onboarding::roles::{self, RawRoles, RoleSet};
use crate::onboarding::state::VerificationStatus;
use crate::store::migrations;
use crate::store::traits::{Database, ProfileWrite};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations. Writes
/// are serialized through `write_lock` so a transaction never interleaves
/// with another write on the shared connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Classify a libsql error: unique-key violations become `Constraint`.
fn query_err(op: &str, e: libsql::Error) -> DatabaseError {
    let text = e.to_string();
    if text.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {text}"))
    } else {
        DatabaseError::Query(format!("{op}: {text}"))
    }
}

fn column_err(column: &str, e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Query(format!("{column}: {e}"))
}

/// Stored role column into its raw form. Older rows hold a JSON array.
fn stored_roles(raw: Option<String>) -> RawRoles {
    match raw {
        Some(s) if s.trim_start().starts_with('[') => {
            match serde_json::from_str::<Vec<String>>(&s) {
                Ok(tokens) => RawRoles::Tokens(tokens),
                Err(e) => {
                    warn!(raw = %s, error = %e, "Unreadable legacy role array");
                    RawRoles::Absent
                }
            }
        }
        other => RawRoles::from(other),
    }
}

/// Serde name of a closed-vocabulary value.
fn enum_text<T: Serialize>(value: &T) -> Result<String, DatabaseError> {
    match serde_json::to_value(value).map_err(|e| DatabaseError::Serialization(e.to_string()))? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(DatabaseError::Serialization(format!(
            "expected a string variant, got {other}"
        ))),
    }
}

fn required_enum<T: DeserializeOwned>(column: &str, raw: String) -> Result<T, DatabaseError> {
    parse_enum(&raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("{column}: unknown value {raw:?}")))
}

fn list_text<T: Serialize>(values: &[T]) -> Result<String, DatabaseError> {
    serde_json::to_string(values).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

/// Lenient list decoding: NULL or garbage reads as empty.
fn parse_list<T: DeserializeOwned>(raw: Option<String>) -> Vec<T> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn parse_uuid(column: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| column_err(column, e))
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.is_empty())
}

const PROFILE_COLUMNS: &str = "id, identity, roles, status, display_name, created_at, updated_at";

const STUDENT_COLUMNS: &str = "id, profile_id, school, degree_level, field_of_study, internship_type, internship_duration, linkedin_url, target_city, available_from, objective, target_countries, target_sectors, languages, proof_documents, onboarding_complete, created_at, updated_at";

const MENTOR_COLUMNS: &str = "id, profile_id, company, current_position, experience_years, linkedin_url, contact_types, coaching_formats, monthly_capacity, bio, accepting_mentees, expertise_sectors, target_countries, languages, proof_documents, onboarding_complete, created_at, updated_at";

/// Map a libsql Row to a Profile (column order matches PROFILE_COLUMNS).
fn row_to_profile(row: &libsql::Row) -> Result<Profile, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| column_err("profile.id", e))?;
    let identity: String = row.get(1).map_err(|e| column_err("profile.identity", e))?;
    let created_str: String = row.get(5).map_err(|e| column_err("profile.created_at", e))?;
    let updated_str: String = row.get(6).map_err(|e| column_err("profile.updated_at", e))?;

    let roles_raw: Option<String> = row.get(2).unwrap_or_else(|e| {
        warn!(id = %id_str, error = %e, "Unreadable profile roles, treating as none");
        None
    });
    let role_set = roles::normalize(&stored_roles(roles_raw.clone()));
    if role_set.is_empty() && roles_raw.as_deref().is_some_and(|r| !r.trim().is_empty()) {
        warn!(id = %id_str, raw = ?roles_raw, "Stored roles hold no known role");
    }

    // Unreadable moderation state falls back to a fresh review.
    let status = match row.get::<String>(3) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(id = %id_str, raw = %raw, "Unknown profile status, treating as under review");
            VerificationStatus::UnderReview
        }),
        Err(e) => {
            warn!(id = %id_str, error = %e, "Unreadable profile status, treating as under review");
            VerificationStatus::UnderReview
        }
    };

    Ok(Profile {
        id: parse_uuid("profile.id", &id_str)?,
        identity: ParticipantId::new(identity),
        role_set,
        status,
        display_name: non_empty(row.get(4).ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_student(row: &libsql::Row) -> Result<StudentDetail, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| column_err("student.id", e))?;
    let profile_str: String = row.get(1).map_err(|e| column_err("student.profile_id", e))?;
    let degree_raw: String = row.get(3).map_err(|e| column_err("student.degree_level", e))?;
    let type_raw: String = row.get(5).map_err(|e| column_err("student.internship_type", e))?;
    let available_raw: Option<String> = non_empty(row.get(9).ok());
    let complete: i64 = row.get(15).unwrap_or(0);
    let created_str: String = row.get(16).map_err(|e| column_err("student.created_at", e))?;
    let updated_str: String = row.get(17).map_err(|e| column_err("student.updated_at", e))?;

    Ok(StudentDetail {
        id: parse_uuid("student.id", &id_str)?,
        profile_id: parse_uuid("student.profile_id", &profile_str)?,
        school: row.get(2).map_err(|e| column_err("student.school", e))?,
        degree_level: required_enum("student.degree_level", degree_raw)?,
        field_of_study: row.get(4).map_err(|e| column_err("student.field_of_study", e))?,
        internship_type: required_enum("student.internship_type", type_raw)?,
        internship_duration: row
            .get(6)
            .map_err(|e| column_err("student.internship_duration", e))?,
        linkedin_url: row.get(7).map_err(|e| column_err("student.linkedin_url", e))?,
        target_city: non_empty(row.get(8).ok()),
        available_from: available_raw
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        objective: non_empty(row.get(10).ok()),
        target_countries: parse_list(row.get(11).ok()),
        target_sectors: parse_list(row.get(12).ok()),
        languages: parse_list(row.get(13).ok()),
        proof_documents: parse_list(row.get(14).ok()),
        onboarding_complete: complete != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_mentor(row: &libsql::Row) -> Result<MentorDetail, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| column_err("mentor.id", e))?;
    let profile_str: String = row.get(1).map_err(|e| column_err("mentor.profile_id", e))?;
    let years: i64 = row.get(4).map_err(|e| column_err("mentor.experience_years", e))?;
    let capacity: i64 = row.get(8).map_err(|e| column_err("mentor.monthly_capacity", e))?;
    let accepting: i64 = row.get(10).unwrap_or(1);
    let complete: i64 = row.get(15).unwrap_or(0);
    let created_str: String = row.get(16).map_err(|e| column_err("mentor.created_at", e))?;
    let updated_str: String = row.get(17).map_err(|e| column_err("mentor.updated_at", e))?;

    Ok(MentorDetail {
        id: parse_uuid("mentor.id", &id_str)?,
        profile_id: parse_uuid("mentor.profile_id", &profile_str)?,
        company: row.get(2).map_err(|e| column_err("mentor.company", e))?,
        current_position: row.get(3).map_err(|e| column_err("mentor.current_position", e))?,
        experience_years: u32::try_from(years)
            .map_err(|e| column_err("mentor.experience_years", e))?,
        linkedin_url: row.get(5).map_err(|e| column_err("mentor.linkedin_url", e))?,
        contact_types: parse_list(row.get(6).ok()),
        coaching_formats: parse_list(row.get(7).ok()),
        monthly_capacity: u32::try_from(capacity)
            .map_err(|e| column_err("mentor.monthly_capacity", e))?,
        bio: non_empty(row.get(9).ok()),
        accepting_mentees: accepting != 0,
        expertise_sectors: parse_list(row.get(11).ok()),
        target_countries: parse_list(row.get(12).ok()),
        languages: parse_list(row.get(13).ok()),
        proof_documents: parse_list(row.get(14).ok()),
        onboarding_complete: complete != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Statement helpers (usable on a connection or a transaction) ─────

async fn insert_profile_on(conn: &Connection, profile: &Profile) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO profiles ({PROFILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            profile.id.to_string(),
            profile.identity.as_str(),
            roles::serialize(&profile.role_set),
            profile.status.as_str(),
            profile.display_name.as_deref(),
            profile.created_at.to_rfc3339(),
            profile.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| query_err("insert_profile", e))?;
    debug!(id = %profile.id, identity = %profile.identity, "Profile created");
    Ok(())
}

async fn update_profile_roles_on(
    conn: &Connection,
    id: Uuid,
    role_set: &RoleSet,
    status: VerificationStatus,
) -> Result<(), DatabaseError> {
    let count = conn
        .execute(
            "UPDATE profiles SET roles = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                roles::serialize(role_set),
                status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| query_err("update_profile_roles", e))?;
    if count == 0 {
        return Err(DatabaseError::NotFound {
            entity: "profile".into(),
            id: id.to_string(),
        });
    }
    debug!(id = %id, roles = %role_set, status = %status, "Profile roles updated");
    Ok(())
}

async fn upsert_student_on(conn: &Connection, d: &StudentDetail) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO student_details ({STUDENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT (profile_id) DO UPDATE SET
                school = excluded.school,
                degree_level = excluded.degree_level,
                field_of_study = excluded.field_of_study,
                internship_type = excluded.internship_type,
                internship_duration = excluded.internship_duration,
                linkedin_url = excluded.linkedin_url,
                target_city = excluded.target_city,
                available_from = excluded.available_from,
                objective = excluded.objective,
                target_countries = excluded.target_countries,
                target_sectors = excluded.target_sectors,
                languages = excluded.languages,
                proof_documents = excluded.proof_documents,
                onboarding_complete = excluded.onboarding_complete,
                updated_at = excluded.updated_at"
        ),
        params![
            d.id.to_string(),
            d.profile_id.to_string(),
            d.school.as_str(),
            enum_text(&d.degree_level)?,
            d.field_of_study.as_str(),
            enum_text(&d.internship_type)?,
            d.internship_duration.as_str(),
            d.linkedin_url.as_str(),
            d.target_city.as_deref(),
            d.available_from.map(|date| date.format("%Y-%m-%d").to_string()),
            d.objective.as_deref(),
            list_text(&d.target_countries)?,
            list_text(&d.target_sectors)?,
            list_text(&d.languages)?,
            list_text(&d.proof_documents)?,
            d.onboarding_complete as i64,
            d.created_at.to_rfc3339(),
            d.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| query_err("upsert_student_detail", e))?;
    debug!(profile_id = %d.profile_id, "Student detail written");
    Ok(())
}

async fn upsert_mentor_on(conn: &Connection, d: &MentorDetail) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO mentor_details ({MENTOR_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT (profile_id) DO UPDATE SET
                company = excluded.company,
                current_position = excluded.current_position,
                experience_years = excluded.experience_years,
                linkedin_url = excluded.linkedin_url,
                contact_types = excluded.contact_types,
                coaching_formats = excluded.coaching_formats,
                monthly_capacity = excluded.monthly_capacity,
                bio = excluded.bio,
                accepting_mentees = excluded.accepting_mentees,
                expertise_sectors = excluded.expertise_sectors,
                target_countries = excluded.target_countries,
                languages = excluded.languages,
                proof_documents = excluded.proof_documents,
                onboarding_complete = excluded.onboarding_complete,
                updated_at = excluded.updated_at"
        ),
        params![
            d.id.to_string(),
            d.profile_id.to_string(),
            d.company.as_str(),
            d.current_position.as_str(),
            d.experience_years as i64,
            d.linkedin_url.as_str(),
            list_text(&d.contact_types)?,
            list_text(&d.coaching_formats)?,
            d.monthly_capacity as i64,
            d.bio.as_deref(),
            d.accepting_mentees as i64,
            list_text(&d.expertise_sectors)?,
            list_text(&d.target_countries)?,
            list_text(&d.languages)?,
            list_text(&d.proof_documents)?,
            d.onboarding_complete as i64,
            d.created_at.to_rfc3339(),
            d.updated_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| query_err("upsert_mentor_detail", e))?;
    debug!(profile_id = %d.profile_id, "Mentor detail written");
    Ok(())
}

async fn write_onboarding_on(
    conn: &Connection,
    profile: &ProfileWrite,
    detail: &RoleDetail,
) -> Result<(), DatabaseError> {
    match profile {
        ProfileWrite::Create(p) => insert_profile_on(conn, p).await?,
        ProfileWrite::Update {
            id,
            role_set,
            status,
        } => update_profile_roles_on(conn, *id, role_set, *status).await?,
    }
    match detail {
        RoleDetail::Student(d) => upsert_student_on(conn, d).await,
        RoleDetail::Mentor(d) => upsert_mentor_on(conn, d).await,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile_by_identity(
        &self,
        identity: &ParticipantId,
    ) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE identity = ?1"),
                params![identity.as_str()],
            )
            .await
            .map_err(|e| query_err("get_profile_by_identity", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_profile_by_identity row", e)),
        }
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        insert_profile_on(self.conn(), profile).await
    }

    async fn update_profile_roles(
        &self,
        id: Uuid,
        role_set: &RoleSet,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        update_profile_roles_on(self.conn(), id, role_set, status).await
    }

    async fn set_profile_status(
        &self,
        id: Uuid,
        status: VerificationStatus,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let count = self
            .conn()
            .execute(
                "UPDATE profiles SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| query_err("set_profile_status", e))?;
        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "profile".into(),
                id: id.to_string(),
            });
        }
        debug!(id = %id, status = %status, "Profile status set");
        Ok(())
    }

    // ── Role details ────────────────────────────────────────────────

    async fn get_student_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<StudentDetail>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM student_details WHERE profile_id = ?1"),
                params![profile_id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_student_detail", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_student(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_student_detail row", e)),
        }
    }

    async fn get_mentor_detail(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<MentorDetail>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MENTOR_COLUMNS} FROM mentor_details WHERE profile_id = ?1"),
                params![profile_id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_mentor_detail", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_mentor(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_mentor_detail row", e)),
        }
    }

    async fn upsert_student_detail(&self, detail: &StudentDetail) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        upsert_student_on(self.conn(), detail).await
    }

    async fn upsert_mentor_detail(&self, detail: &MentorDetail) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        upsert_mentor_on(self.conn(), detail).await
    }

    /// Both writes in one transaction: either the profile and its detail
    /// land together, or neither does.
    async fn apply_onboarding(
        &self,
        profile: &ProfileWrite,
        detail: &RoleDetail,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| query_err("begin onboarding transaction", e))?;

        match write_onboarding_on(&tx, profile, detail).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| query_err("commit onboarding transaction", e))?;
                debug!(
                    profile_id = %profile.profile_id(),
                    role = %detail.role(),
                    "Onboarding write committed"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Failed to roll back onboarding transaction");
                }
                Err(e)
            }
        }
    }
}
