use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Versioned SQL migration embedded in the binary
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: &'static str,
    pub sql: &'static str,
}

/// Schema migrations in application order
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: "0001_initial_schema",
    sql: include_str!("../../migrations/0001_initial_schema.sql"),
}];

/// Applies embedded migrations, tracking applied versions in `schema_migrations`
///
/// Each migration runs in its own transaction together with the insert that
/// records it, so a failed migration leaves no partial version row behind.
pub struct MigrationRunner {
    client: PostgresClient,
    migrations: &'static [Migration],
}

impl MigrationRunner {
    pub fn new(client: PostgresClient) -> Self {
        Self {
            client,
            migrations: MIGRATIONS,
        }
    }

    /// Runs all pending migrations
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or a migration fails
    pub async fn run_migrations(&self) -> Result<()> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .context("Failed to get connection for migrations")?;

        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await
        .context("Failed to create schema_migrations table")?;

        let mut applied = 0;
        for migration in self.migrations {
            let existing = conn
                .query_opt(
                    "SELECT version FROM schema_migrations WHERE version = $1",
                    &[&migration.version],
                )
                .await
                .context("Failed to read schema_migrations")?;

            if existing.is_some() {
                debug!(version = migration.version, "migration already applied");
                continue;
            }

            let tx = conn.transaction().await?;
            tx.batch_execute(migration.sql)
                .await
                .with_context(|| format!("Migration {} failed", migration.version))?;
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES ($1)",
                &[&migration.version],
            )
            .await?;
            tx.commit().await?;

            info!(version = migration.version, "applied migration");
            applied += 1;
        }

        info!(applied, total = self.migrations.len(), "migrations complete");
        Ok(())
    }

    /// Versions recorded as applied, in application order
    pub async fn applied_versions(&self) -> Result<Vec<String>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT version FROM schema_migrations ORDER BY version",
                &[],
            )
            .await
            .context("Failed to read schema_migrations")?;

        Ok(rows.iter().map(|row| row.get("version")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_versions_are_ordered_and_unique() {
        let versions: Vec<&str> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        sorted.dedup();

        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_initial_schema_creates_event_hypertable() {
        let initial = MIGRATIONS[0].sql;

        assert!(initial.contains("PRIMARY KEY (device_id, event_type, occurred_time)"));
        assert!(initial.contains("create_hypertable('events', 'occurred_time'"));
        assert!(initial.contains("(device_id, occurred_time DESC)"));
    }
}
