//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                identity TEXT NOT NULL UNIQUE,
                roles TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'under_review',
                display_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_status ON profiles(status);
        "#,
    },
    Migration {
        version: 2,
        name: "role_details",
        sql: r#"
            CREATE TABLE IF NOT EXISTS student_details (
                id TEXT PRIMARY KEY,
                profile_id TEXT NOT NULL UNIQUE REFERENCES profiles(id) ON DELETE CASCADE,
                school TEXT NOT NULL,
                degree_level TEXT NOT NULL,
                field_of_study TEXT NOT NULL,
                internship_type TEXT NOT NULL,
                internship_duration TEXT NOT NULL,
                linkedin_url TEXT NOT NULL,
                target_city TEXT,
                available_from TEXT,
                objective TEXT,
                target_countries TEXT NOT NULL DEFAULT '[]',
                target_sectors TEXT NOT NULL DEFAULT '[]',
                languages TEXT NOT NULL DEFAULT '[]',
                proof_documents TEXT NOT NULL DEFAULT '[]',
                onboarding_complete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mentor_details (
                id TEXT PRIMARY KEY,
                profile_id TEXT NOT NULL UNIQUE REFERENCES profiles(id) ON DELETE CASCADE,
                company TEXT NOT NULL,
                current_position TEXT NOT NULL,
                experience_years INTEGER NOT NULL,
                linkedin_url TEXT NOT NULL,
                contact_types TEXT NOT NULL DEFAULT '[]',
                coaching_formats TEXT NOT NULL DEFAULT '[]',
                monthly_capacity INTEGER NOT NULL,
                bio TEXT,
                accepting_mentees INTEGER NOT NULL DEFAULT 1,
                expertise_sectors TEXT NOT NULL DEFAULT '[]',
                target_countries TEXT NOT NULL DEFAULT '[]',
                languages TEXT NOT NULL DEFAULT '[]',
                proof_documents TEXT NOT NULL DEFAULT '[]',
                onboarding_complete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
];

/// Bring the schema up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
