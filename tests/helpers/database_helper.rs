//! Test database helper utilities
//!
//! PostgreSQL tests only run when `TEST_DATABASE_URL` points at a disposable
//! database; otherwise they return early.

use sqlx::PgPool;
use Encontro::config::DatabaseConfig;
use Encontro::database::{create_pool, run_migrations, DatabaseService};

/// Test database helper that manages PostgreSQL test database setup
pub struct TestDatabase {
    pub pool: PgPool,
    pub database_url: String,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when no test database is configured
    pub async fn from_env() -> Option<Self> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
        let config = DatabaseConfig {
            url: database_url.clone(),
            max_connections: 5,
            min_connections: 1,
        };

        let pool = create_pool(&config).await.expect("Failed to connect to test database");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let database = Self { pool, database_url };
        database.cleanup().await.expect("Failed to clean test database");
        Some(database)
    }

    pub fn service(&self) -> DatabaseService {
        DatabaseService::new(self.pool.clone())
    }

    /// Clean all test data from the database
    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        // Delete in reverse order of dependencies
        for table in [
            "notifications",
            "event_photos",
            "ratings",
            "waiting_list",
            "event_participants",
            "trust_profiles",
            "events",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table)).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn count_records(&self, table: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
