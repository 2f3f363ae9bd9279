//! Database module providing connection management, migrations, and queries.

pub mod service_orders;

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;
use crate::models::ServiceOrderRecord;

/// Persistence seam for service order records.
///
/// Records are inserted once and never updated.
#[async_trait]
pub trait ServiceOrderRepository: Send + Sync {
    /// Check that the record store is reachable.
    async fn ping(&self) -> AppResult<()>;

    /// Insert a fully assembled record in a single call.
    async fn insert_service_order(&self, record: ServiceOrderRecord)
    -> AppResult<ServiceOrderRecord>;

    /// Fetch a record by its id.
    async fn get_service_order(&self, id: Uuid) -> AppResult<Option<ServiceOrderRecord>>;
}

/// Database connection pool wrapper (PostgreSQL via SeaORM).
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Connect to the database described by the settings.
    pub async fn new(settings: &DatabaseSettings) -> AppResult<Self> {
        let mut options = ConnectOptions::new(settings.url.clone());
        options
            .max_connections(settings.max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(DbPool { conn })
    }

    /// Get access to the connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Apply pending migrations.
    pub async fn run_migrations(&self) -> AppResult<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| AppError::Database(format!("Failed to run migrations: {}", e)))
    }
}
