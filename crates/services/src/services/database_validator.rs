//! Startup check that the schema matches what this build expects.

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Compare applied migrations with the embedded set and look for the
    /// tables the application needs.
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let migrations_table_exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_one(&self.pool)
        .await?
            > 0;

        if !migrations_table_exists {
            warn!("Database not initialized, _sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                pending_migrations: db::MIGRATOR
                    .iter()
                    .map(|m| format!("{} {}", m.version, m.description))
                    .collect(),
                missing_tables: self.missing_tables(db::REQUIRED_TABLES).await?,
            });
        }

        let applied: BTreeSet<i64> =
            sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        let pending_migrations = db::MIGRATOR
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .map(|m| format!("{} {}", m.version, m.description))
            .collect();

        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: applied.len(),
            pending_migrations,
            missing_tables: self.missing_tables(db::REQUIRED_TABLES).await?,
        };

        if result.is_ok() {
            info!(migrations_applied = result.migrations_applied, "Database validation complete");
        } else {
            warn!(summary = %result.summary(), "Database validation found problems");
        }
        Ok(result)
    }

    pub async fn missing_tables(
        &self,
        required_tables: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing = Vec::new();
        for table in required_tables {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            )
            .bind(*table)
            .fetch_one(&self.pool)
            .await?
                > 0;
            if !exists {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub pending_migrations: Vec<String>,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.pending_migrations.is_empty() && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            "Database not initialized - migrations need to be run".to_string()
        } else if !self.missing_tables.is_empty() {
            format!("Missing tables: {}", self.missing_tables.join(", "))
        } else if !self.pending_migrations.is_empty() {
            format!("Pending migrations: {}", self.pending_migrations.join(", "))
        } else {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    #[tokio::test]
    async fn test_migrated_database_is_ok() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();
        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(result.migrations_applied, db::MIGRATOR.iter().count());
    }

    #[tokio::test]
    async fn test_empty_database_is_not_initialized() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let result = DatabaseValidator::new(pool).validate().await.unwrap();
        assert!(!result.is_initialized);
        assert!(!result.pending_migrations.is_empty());
        assert_eq!(result.missing_tables.len(), db::REQUIRED_TABLES.len());
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_table_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        sqlx::query("DROP TABLE checklist_subtasks")
            .execute(&db.pool)
            .await
            .unwrap();
        let result = DatabaseValidator::new(db.pool.clone()).validate().await.unwrap();
        assert_eq!(result.missing_tables, vec!["checklist_subtasks".to_string()]);
        assert!(result.summary().contains("checklist_subtasks"));
    }
}
