use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "larapg.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    MakeModel,
    MakeMigration,
    Migrate,
    MigrateFresh,
    MigrateRollback,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    MakeModel(MakeModelArgs),
    MakeMigration(MakeMigrationArgs),
    Migrate(MigrateArgs),
}

#[derive(Debug, Clone)]
pub struct MakeModelArgs {
    pub name: String,
    pub config: PathBuf,
    /// Output directory; overrides `[models] dir`.
    pub dir: Option<PathBuf>,
    /// Also generate a `create_<table>` migration.
    pub migration: bool,
}

#[derive(Debug, Clone)]
pub struct MakeMigrationArgs {
    pub name: String,
    pub config: PathBuf,
    /// Output directory; overrides `[migrations] dir`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateMode {
    Up,
    Fresh,
    Rollback,
}

#[derive(Debug, Clone)]
pub struct MigrateArgs {
    pub mode: MigrateMode,
    pub config: PathBuf,
    pub database: Option<String>,
    pub dir: Option<PathBuf>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(|s| s.as_str());
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "make:model" => parse_make_model(it),
        "make:migration" => parse_make_migration(it),
        "migrate" => parse_migrate(MigrateMode::Up, it),
        "migrate:fresh" => parse_migrate(MigrateMode::Fresh, it),
        "migrate:rollback" => parse_migrate(MigrateMode::Rollback, it),
        _ => anyhow::bail!("unknown command: {first} (run `lara --help`)"),
    }
}

/// Match `--flag <v>` and `--flag=<v>`.
fn flag_value<'a>(
    token: &'a str,
    flag: &str,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<&'a str>> {
    if token == flag {
        let Some(v) = it.next() else {
            anyhow::bail!("{flag} requires a value");
        };
        return Ok(Some(v));
    }
    Ok(token
        .strip_prefix(flag)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn parse_make_model<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut name: Option<String> = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut dir: Option<PathBuf> = None;
    let mut migration = false;

    while let Some(token) = it.next() {
        if matches!(token, "-h" | "--help") {
            return Ok(Command::Help(HelpTopic::MakeModel));
        }
        if let Some(v) = flag_value(token, "--config", &mut it)? {
            config = PathBuf::from(v);
            continue;
        }
        if let Some(v) = flag_value(token, "--dir", &mut it)? {
            dir = Some(PathBuf::from(v));
            continue;
        }
        match token {
            "-m" | "--migration" => migration = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if name.is_none() => name = Some(other.to_string()),
            other => anyhow::bail!("unexpected positional argument: {other}"),
        }
    }

    let Some(name) = name else {
        anyhow::bail!("make:model requires a model name");
    };
    Ok(Command::MakeModel(MakeModelArgs {
        name,
        config,
        dir,
        migration,
    }))
}

fn parse_make_migration<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut name: Option<String> = None;
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut dir: Option<PathBuf> = None;

    while let Some(token) = it.next() {
        if matches!(token, "-h" | "--help") {
            return Ok(Command::Help(HelpTopic::MakeMigration));
        }
        if let Some(v) = flag_value(token, "--config", &mut it)? {
            config = PathBuf::from(v);
            continue;
        }
        if let Some(v) = flag_value(token, "--dir", &mut it)? {
            dir = Some(PathBuf::from(v));
            continue;
        }
        match token {
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if name.is_none() => name = Some(other.to_string()),
            other => anyhow::bail!("unexpected positional argument: {other}"),
        }
    }

    let Some(name) = name else {
        anyhow::bail!("make:migration requires a migration name");
    };
    Ok(Command::MakeMigration(MakeMigrationArgs { name, config, dir }))
}

fn parse_migrate<'a>(
    mode: MigrateMode,
    mut it: impl Iterator<Item = &'a str>,
) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut database: Option<String> = None;
    let mut dir: Option<PathBuf> = None;

    while let Some(token) = it.next() {
        if matches!(token, "-h" | "--help") {
            return Ok(Command::Help(match mode {
                MigrateMode::Up => HelpTopic::Migrate,
                MigrateMode::Fresh => HelpTopic::MigrateFresh,
                MigrateMode::Rollback => HelpTopic::MigrateRollback,
            }));
        }
        if let Some(v) = flag_value(token, "--config", &mut it)? {
            config = PathBuf::from(v);
            continue;
        }
        if let Some(v) = flag_value(token, "--database", &mut it)? {
            database = Some(v.to_string());
            continue;
        }
        if let Some(v) = flag_value(token, "--dir", &mut it)? {
            dir = Some(PathBuf::from(v));
            continue;
        }
        if token.starts_with('-') {
            anyhow::bail!("unknown argument: {token}");
        }
        anyhow::bail!("unexpected positional argument: {token}");
    }

    Ok(Command::Migrate(MigrateArgs {
        mode,
        config,
        database,
        dir,
    }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
lara - generators and migrations for larapg apps

USAGE:
  lara <COMMAND> [OPTIONS]

COMMANDS:
  make:model <Name>       Generate a model file (and optionally its migration)
  make:migration <name>   Generate an up/down migration pair
  migrate                 Apply all migrations in version order
  migrate:fresh           Drop every table, then apply all migrations
  migrate:rollback        Revert all migrations in reverse version order

Run `lara <command> --help` for more."
            );
        }
        HelpTopic::MakeModel => {
            println!(
                "\
USAGE:
  lara make:model <Name> [OPTIONS]

OPTIONS:
  -m, --migration       Also generate a create_<table> migration
  --dir <DIR>           Output directory (default: [models] dir, src/models)
  --config <FILE>       Config file path (default: larapg.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::MakeMigration => {
            println!(
                "\
USAGE:
  lara make:migration <name> [OPTIONS]

Writes <version>_<name>.up.sql and <version>_<name>.down.sql where <version>
is the current UTC time as YYYYMMDDHHMMSS. A name like create_widgets_table
produces a guarded CREATE TABLE for `widgets`.

OPTIONS:
  --dir <DIR>           Output directory (default: [migrations] dir, database/migrations)
  --config <FILE>       Config file path (default: larapg.toml)
  -h, --help            Print help"
            );
        }
        HelpTopic::Migrate => {
            println!(
                "\
USAGE:
  lara migrate [OPTIONS]

Runs every up script in ascending version order and stops at the first failure.

OPTIONS:
  --config <FILE>       Config file path (default: larapg.toml)
  --database <URL>      Override database.url from config
  --dir <DIR>           Migrations directory override
  -h, --help            Print help"
            );
        }
        HelpTopic::MigrateFresh => {
            println!(
                "\
USAGE:
  lara migrate:fresh [OPTIONS]

Drops every table in the configured schema (CASCADE), then runs `migrate`.

OPTIONS:
  --config <FILE>       Config file path (default: larapg.toml)
  --database <URL>      Override database.url from config
  --dir <DIR>           Migrations directory override
  -h, --help            Print help"
            );
        }
        HelpTopic::MigrateRollback => {
            println!(
                "\
USAGE:
  lara migrate:rollback [OPTIONS]

Runs every down script in descending version order and stops at the first failure.

OPTIONS:
  --config <FILE>       Config file path (default: larapg.toml)
  --database <URL>      Override database.url from config
  --dir <DIR>           Migrations directory override
  -h, --help            Print help"
            );
        }
    }
}
