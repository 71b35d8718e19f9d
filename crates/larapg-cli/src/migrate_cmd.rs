use crate::cli::{MigrateArgs, MigrateMode};
use crate::settings::{load_optional_config, resolve_database};
use anyhow::Context;
use larapg::{MigrationRegistry, MigrationReport, MigrationRunner};

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let cfg = load_optional_config(&args.config)?;
    let dir = args.dir.clone().unwrap_or_else(|| cfg.migrations_dir());
    let registry = MigrationRegistry::from_dir(&dir)
        .with_context(|| format!("failed to load migrations from {}", dir.display()))?;

    if registry.is_empty() && args.mode != MigrateMode::Fresh {
        println!("no migrations found in {}", dir.display());
        return Ok(());
    }

    let database_url = resolve_database(&cfg, args.database)?;
    let client = connect(&database_url).await?;
    let runner = MigrationRunner::new(registry).with_schema(cfg.database.schema.clone());

    let work = async {
        match args.mode {
            MigrateMode::Up => runner.migrate(&client).await,
            MigrateMode::Fresh => runner.fresh(&client).await,
            MigrateMode::Rollback => runner.rollback(&client).await,
        }
    };

    let report = tokio::select! {
        report = work => report,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("interrupted; migrations completed before the interrupt remain applied");
        }
    };

    print_report(args.mode, &report);
    report.into_result()?;
    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls)
        .await
        .context("failed to connect to database")?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            tracing::error!(error = %err, "connection error");
        }
    });

    Ok(client)
}

fn print_report(mode: MigrateMode, report: &MigrationReport) {
    if mode == MigrateMode::Fresh {
        if report.dropped.is_empty() {
            println!("dropped 0 table(s)");
        } else {
            println!(
                "dropped {} table(s): {}",
                report.dropped.len(),
                report.dropped.join(", ")
            );
        }
    }

    let (verb, steps): (&str, Vec<_>) = match mode {
        MigrateMode::Rollback => ("reverted", report.reverted().collect()),
        MigrateMode::Up | MigrateMode::Fresh => ("applied", report.applied().collect()),
    };
    println!("{verb} {} migration(s)", steps.len());
    for s in steps {
        println!("  {}_{} ({} ms)", s.version, s.name, s.elapsed.as_millis());
    }

    if let Some(failed) = report.failed_step() {
        let skipped = report
            .steps
            .iter()
            .filter(|s| s.state == larapg::MigrationState::Inert)
            .count();
        println!(
            "stopped at {}_{}; {skipped} migration(s) not run",
            failed.version, failed.name
        );
    }
}
