use super::{Migration, MigrationRegistry, MigrationState, SchemaExecutor};
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use std::time::{Duration, Instant};

/// Outcome of one migration within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub version: i64,
    pub name: String,
    pub state: MigrationState,
    pub elapsed: Duration,
}

/// What a `migrate`, `fresh` or `rollback` run did.
///
/// Steps are listed in execution order; steps after a failure stay
/// [`MigrationState::Inert`].
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub steps: Vec<StepReport>,
    /// Tables dropped by `fresh` before re-applying.
    pub dropped: Vec<String>,
    failure: Option<OrmError>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&OrmError> {
        self.failure.as_ref()
    }

    pub fn applied(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| s.state == MigrationState::Applied)
    }

    pub fn reverted(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| s.state == MigrationState::Reverted)
    }

    /// The failed step, if any.
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| s.state == MigrationState::Failed)
    }

    /// `Err` with the failure when the run stopped early.
    pub fn into_result(mut self) -> OrmResult<Self> {
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    fn pending<'a>(migrations: impl Iterator<Item = &'a dyn Migration>) -> Self {
        Self {
            steps: migrations
                .map(|m| StepReport {
                    version: m.version(),
                    name: m.name().to_string(),
                    state: MigrationState::Inert,
                    elapsed: Duration::ZERO,
                })
                .collect(),
            dropped: Vec::new(),
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// Applies the migrations of a [`MigrationRegistry`], one at a time.
#[derive(Debug)]
pub struct MigrationRunner {
    registry: MigrationRegistry,
    schema: String,
    step_timeout: Option<Duration>,
}

impl MigrationRunner {
    pub fn new(registry: MigrationRegistry) -> Self {
        Self {
            registry,
            schema: "public".to_string(),
            step_timeout: None,
        }
    }

    /// Schema whose tables `fresh` drops. Defaults to `public`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Fail a step that runs longer than `timeout`.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Run `up` for every migration in ascending version order.
    ///
    /// Stops at the first failure; migrations applied before it stay applied.
    pub async fn migrate(&self, conn: &dyn SchemaExecutor) -> MigrationReport {
        let mut report = MigrationReport::pending(self.registry.iter());
        self.run(conn, Direction::Up, &mut report).await;
        report
    }

    /// Drop every table in the schema, then [`migrate`](Self::migrate).
    pub async fn fresh(&self, conn: &dyn SchemaExecutor) -> MigrationReport {
        let mut report = MigrationReport::pending(self.registry.iter());
        match self.drop_all_tables(conn).await {
            Ok(dropped) => report.dropped = dropped,
            Err(err) => {
                tracing::error!(target: "larapg.migrate", schema = %self.schema, error = %err, "dropping tables failed");
                report.failure = Some(err);
                return report;
            }
        }
        self.run(conn, Direction::Up, &mut report).await;
        report
    }

    /// Run `down` for every migration in descending version order.
    pub async fn rollback(&self, conn: &dyn SchemaExecutor) -> MigrationReport {
        let mut report = MigrationReport::pending(self.registry.iter().rev());
        self.run(conn, Direction::Down, &mut report).await;
        report
    }

    async fn drop_all_tables(&self, conn: &dyn SchemaExecutor) -> OrmResult<Vec<String>> {
        let schema = Ident::new(&self.schema)?;
        let tables = conn.table_names(schema.as_str()).await?;
        if tables.is_empty() {
            tracing::info!(target: "larapg.migrate", schema = %schema, "no tables to drop");
            return Ok(tables);
        }

        let list = tables
            .iter()
            .map(|t| format!("{}.{}", schema.to_sql(), quote_existing(t)))
            .collect::<Vec<_>>()
            .join(", ");
        conn.batch_execute(&format!("DROP TABLE IF EXISTS {list} CASCADE"))
            .await?;

        tracing::info!(target: "larapg.migrate", schema = %schema, count = tables.len(), "dropped all tables");
        Ok(tables)
    }

    async fn run(&self, conn: &dyn SchemaExecutor, direction: Direction, report: &mut MigrationReport) {
        let order: Vec<&dyn Migration> = match direction {
            Direction::Up => self.registry.iter().collect(),
            Direction::Down => self.registry.iter().rev().collect(),
        };

        for (step, migration) in report.steps.iter_mut().zip(order) {
            let (verb, done) = match direction {
                Direction::Up => ("applying", MigrationState::Applied),
                Direction::Down => ("reverting", MigrationState::Reverted),
            };
            tracing::info!(
                target: "larapg.migrate",
                version = migration.version(),
                name = migration.name(),
                "{verb} migration"
            );

            step.state = MigrationState::Applying;
            let started = Instant::now();
            let result = self.run_step(conn, migration, direction).await;
            step.elapsed = started.elapsed();

            match result {
                Ok(()) => {
                    step.state = done;
                    tracing::info!(
                        target: "larapg.migrate",
                        version = migration.version(),
                        name = migration.name(),
                        elapsed_ms = step.elapsed.as_millis() as u64,
                        "migration {}", done
                    );
                }
                Err(err) => {
                    step.state = MigrationState::Failed;
                    tracing::error!(
                        target: "larapg.migrate",
                        version = migration.version(),
                        name = migration.name(),
                        error = %err,
                        "migration failed"
                    );
                    report.failure = Some(OrmError::migration(
                        migration.version(),
                        migration.name(),
                        err.to_string(),
                    ));
                    return;
                }
            }
        }
    }

    async fn run_step(
        &self,
        conn: &dyn SchemaExecutor,
        migration: &dyn Migration,
        direction: Direction,
    ) -> OrmResult<()> {
        let fut = async {
            match direction {
                Direction::Up => migration.up(conn).await,
                Direction::Down => migration.down(conn).await,
            }
        };
        match self.step_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| OrmError::Timeout(limit))?,
            None => fut.await,
        }
    }
}

/// Quote a name read back from the catalog, which may not be identifier-safe.
fn quote_existing(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
