//! Ordered schema migrations.
//!
//! A [`MigrationRegistry`] holds every [`Migration`] known to the program,
//! keyed by version. [`MigrationRunner`] applies them in ascending version
//! order (`migrate`), rebuilds the schema from empty (`fresh`), or reverts
//! them in descending order (`rollback`).
//!
//! No history table is kept. Every `up` script must be existence-guarded
//! (`CREATE TABLE IF NOT EXISTS ...`) so repeated runs are harmless.
//!
//! # Example
//!
//! ```ignore
//! use larapg::migrate::{MigrationRegistry, MigrationRunner};
//!
//! let registry = MigrationRegistry::from_dir("database/migrations")?;
//! let report = MigrationRunner::new(registry).migrate(&client).await?;
//! println!("applied {} migration(s)", report.applied().count());
//! ```
//!
//! File names are `<version>_<name>.up.sql` with an optional
//! `<version>_<name>.down.sql`, e.g. `20261019120000_create_widgets_table.up.sql`.

mod registry;
mod runner;

pub use registry::MigrationRegistry;
pub use runner::{MigrationReport, MigrationRunner, StepReport};

use crate::error::{OrmError, OrmResult};
use async_trait::async_trait;
use std::fmt;

/// The connection surface migrations run against.
#[async_trait]
pub trait SchemaExecutor: Send + Sync {
    /// Run one or more `;`-separated statements without parameters.
    async fn batch_execute(&self, sql: &str) -> OrmResult<()>;

    /// Names of the ordinary tables in `schema`, sorted.
    async fn table_names(&self, schema: &str) -> OrmResult<Vec<String>>;
}

const TABLE_NAMES_SQL: &str =
    "SELECT tablename::text FROM pg_catalog.pg_tables WHERE schemaname = $1 ORDER BY tablename";

#[async_trait]
impl SchemaExecutor for tokio_postgres::Client {
    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn table_names(&self, schema: &str) -> OrmResult<Vec<String>> {
        let rows = tokio_postgres::Client::query(self, TABLE_NAMES_SQL, &[&schema])
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0)
                    .map_err(|e| OrmError::decode("tablename", e.to_string()))
            })
            .collect()
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl SchemaExecutor for deadpool_postgres::Client {
    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        let client: &tokio_postgres::Client = self;
        SchemaExecutor::batch_execute(client, sql).await
    }

    async fn table_names(&self, schema: &str) -> OrmResult<Vec<String>> {
        let client: &tokio_postgres::Client = self;
        SchemaExecutor::table_names(client, schema).await
    }
}

/// A versioned, reversible schema change.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Ordering key; strictly ascending application order.
    fn version(&self) -> i64;

    fn name(&self) -> &str;

    async fn up(&self, conn: &dyn SchemaExecutor) -> OrmResult<()>;

    async fn down(&self, conn: &dyn SchemaExecutor) -> OrmResult<()>;
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.version(), self.name())
    }
}

/// A migration whose procedures are plain SQL scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    version: i64,
    name: String,
    up_sql: String,
    down_sql: Option<String>,
}

impl SqlMigration {
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: None,
        }
    }

    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down_sql = Some(down_sql.into());
        self
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> Option<&str> {
        self.down_sql.as_deref()
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, conn: &dyn SchemaExecutor) -> OrmResult<()> {
        conn.batch_execute(&self.up_sql).await
    }

    async fn down(&self, conn: &dyn SchemaExecutor) -> OrmResult<()> {
        match &self.down_sql {
            Some(sql) => conn.batch_execute(sql).await,
            None => Err(OrmError::Other(format!(
                "migration {}_{} has no down script",
                self.version, self.name
            ))),
        }
    }
}

/// Lifecycle of one migration within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Not touched by this run.
    Inert,
    Applying,
    Applied,
    Failed,
    /// `down` completed during a rollback.
    Reverted,
}

impl MigrationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inert => "inert",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Reverted => "reverted",
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
